use std::env;
use std::process;
use std::ptr;

use aries_audio_hw::mixer::ControlStatus;
use aries_audio_hw::{AudioDeviceFfi, aries_audio_device_close, aries_audio_device_open};

fn print_controls(title: &str, controls: &[ControlStatus]) {
    println!("{title}:");
    for control in controls {
        let state = if control.inert {
            "inert"
        } else if control.applied {
            "on"
        } else {
            "off"
        };
        println!("  {:<32} {state}", control.name);
    }
}

fn print_status() {
    match aries_audio_hw::console::api::get_status() {
        Some(status) => {
            let routing = status.routing;
            println!("Mode        : {}", routing.mode);
            println!("Call        : {}", status.call);
            println!("Devices     : {:#010x}", routing.devices.bits());
            println!("Call path   : {}", status.call_path);
            println!("Voice volume: {:.2}", routing.voice_volume);
            println!("Headset NR  : {}", if routing.bt_nrec { "on" } else { "off" });
            println!("Mic mute    : {}", if routing.mic_mute { "yes" } else { "no" });
            print_controls("Output path", &status.output_controls);
            print_controls("Input path", &status.input_controls);
            for line in aries_audio_hw::console::api::drain_log() {
                println!("log: {line}");
            }
        }
        None => {
            eprintln!("audiohwctl: no open device");
            process::exit(1);
        }
    }
}

fn main() {
    let mut args = env::args().skip(1);
    let status_only = match args.next().as_deref() {
        None => false,
        Some("--status" | "-s") => true,
        Some("--help" | "-h") => {
            println!(
                "Usage: audiohwctl [--status]\n\nOpens a device on the software backends. Without arguments the interactive console launches."
            );
            return;
        }
        Some(other) => {
            eprintln!("audiohwctl: unknown argument '{other}'");
            process::exit(1);
        }
    };

    let mut device: *mut AudioDeviceFfi = ptr::null_mut();
    let rc = unsafe { aries_audio_device_open(&mut device) };
    if rc != 0 {
        eprintln!("audiohwctl: cannot open device ({rc})");
        process::exit(1);
    }

    let result = if status_only {
        print_status();
        Ok(())
    } else {
        aries_audio_hw::console::ui::run()
    };

    unsafe { aries_audio_device_close(device) };
    if let Err(err) = result {
        eprintln!("audiohwctl: {err}");
        process::exit(1);
    }
}
