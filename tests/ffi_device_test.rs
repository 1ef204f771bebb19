use std::ffi::{CStr, CString};
use std::ptr;

use aries_audio_hw::console::api;
use aries_audio_hw::{
    AUDIO_FORMAT_PCM_16_BIT, AudioConfigFfi, AudioDeviceFfi, AudioDevices, AudioMode,
    CallAudioPath, CallState, InputStreamFfi, OutputStreamFfi, aries_audio_device_close,
    aries_audio_device_get_mic_mute, aries_audio_device_input_buffer_size,
    aries_audio_device_open, aries_audio_device_open_input_stream,
    aries_audio_device_open_output_stream, aries_audio_device_set_mic_mute,
    aries_audio_device_set_mode, aries_audio_device_set_parameters,
    aries_audio_device_set_voice_volume, aries_audio_device_close_input_stream,
    aries_audio_device_close_output_stream, aries_audio_global_device, aries_audio_in_read,
    aries_audio_in_set_parameters, aries_audio_in_standby, aries_audio_out_set_parameters,
    aries_audio_out_standby, aries_audio_out_write, aries_audio_pop_log,
};

fn drain_logs() -> Vec<String> {
    let mut lines = Vec::new();
    loop {
        let line = aries_audio_pop_log();
        if line.is_null() {
            break;
        }
        lines.push(unsafe { CStr::from_ptr(line) }.to_string_lossy().into_owned());
    }
    lines
}

// Every step shares the global device slot, so the whole round trip lives
// in one test.
#[test]
fn c_abi_round_trip() {
    assert!(api::get_status().is_none());
    assert!(api::set_mode(AudioMode::InCall).is_err());

    let mut device: *mut AudioDeviceFfi = ptr::null_mut();
    assert_eq!(unsafe { aries_audio_device_open(&mut device) }, 0);
    assert!(!device.is_null());
    assert_eq!(aries_audio_global_device(), device);
    assert!(drain_logs().iter().any(|l| l.starts_with("device opened")));

    // device controls
    assert_eq!(unsafe { aries_audio_device_set_mode(device, 9) }, -libc::EINVAL);
    assert_eq!(
        unsafe { aries_audio_device_set_voice_volume(device, 2.0) },
        -libc::EINVAL
    );
    assert_eq!(unsafe { aries_audio_device_set_mic_mute(device, true) }, 0);
    let mut muted = false;
    assert_eq!(unsafe { aries_audio_device_get_mic_mute(device, &mut muted) }, 0);
    assert!(muted);
    assert_eq!(unsafe { aries_audio_device_set_mic_mute(device, false) }, 0);
    assert_eq!(
        unsafe { aries_audio_device_set_parameters(device, ptr::null()) },
        -libc::EINVAL
    );
    assert_eq!(unsafe { aries_audio_device_set_mode(ptr::null_mut(), 0) }, -libc::ENODEV);

    let narrowband = AudioConfigFfi {
        sample_rate: 8000,
        channels: 1,
        format: AUDIO_FORMAT_PCM_16_BIT,
    };
    assert_eq!(
        unsafe { aries_audio_device_input_buffer_size(device, &narrowband) },
        384
    );
    let float = AudioConfigFfi {
        format: 0x5,
        ..narrowband
    };
    assert_eq!(unsafe { aries_audio_device_input_buffer_size(device, &float) }, 0);

    // playback
    let mut out_config = AudioConfigFfi {
        sample_rate: 0,
        channels: 0,
        format: 0,
    };
    let mut out: *mut OutputStreamFfi = ptr::null_mut();
    let rc = unsafe {
        aries_audio_device_open_output_stream(
            device,
            AudioDevices::OUT_SPEAKER.bits(),
            &mut out_config,
            &mut out,
        )
    };
    assert_eq!(rc, 0);
    assert_eq!(out_config.sample_rate, 44100);
    assert_eq!(out_config.channels, 2);
    assert_eq!(out_config.format, AUDIO_FORMAT_PCM_16_BIT);

    let pcm = vec![0u8; 1024];
    assert_eq!(unsafe { aries_audio_out_write(out, pcm.as_ptr(), pcm.len()) }, 1024);
    assert_eq!(unsafe { aries_audio_out_write(out, pcm.as_ptr(), 3) }, -(libc::EIO as isize));
    assert_eq!(unsafe { aries_audio_out_write(out, ptr::null(), 4) }, -(libc::EINVAL as isize));
    let status = api::get_status().expect("status");
    assert_eq!(status.output_standby, Some(true));

    let headset = CString::new("routing=4").unwrap();
    assert_eq!(unsafe { aries_audio_out_set_parameters(out, headset.as_ptr()) }, 0);
    assert_eq!(unsafe { aries_audio_out_standby(out) }, 0);

    // capture
    let mut in_config = AudioConfigFfi {
        sample_rate: 16000,
        channels: 1,
        format: AUDIO_FORMAT_PCM_16_BIT,
    };
    let mut input: *mut InputStreamFfi = ptr::null_mut();
    let rc = unsafe {
        aries_audio_device_open_input_stream(
            device,
            AudioDevices::IN_BUILTIN_MIC.bits(),
            &mut in_config,
            &mut input,
        )
    };
    assert_eq!(rc, 0);
    let mut captured = vec![0xffu8; 320];
    assert_eq!(
        unsafe { aries_audio_in_read(input, captured.as_mut_ptr(), captured.len()) },
        320
    );
    assert!(captured.iter().all(|&b| b == 0));
    let mic = CString::new("routing=2147745792").unwrap();
    assert_eq!(unsafe { aries_audio_in_set_parameters(input, mic.as_ptr()) }, 0);
    assert_eq!(unsafe { aries_audio_in_standby(input) }, 0);

    let mut second: *mut InputStreamFfi = ptr::null_mut();
    let rc = unsafe {
        aries_audio_device_open_input_stream(
            device,
            AudioDevices::IN_BUILTIN_MIC.bits(),
            &mut in_config,
            &mut second,
        )
    };
    assert_eq!(rc, -libc::EBUSY);
    assert!(second.is_null());

    // call through the console api
    api::set_mode(AudioMode::InCall).unwrap();
    let status = api::get_status().expect("status");
    assert_eq!(status.call, CallState::InCall);
    assert_eq!(status.call_path, CallAudioPath::Headset);
    assert!(status.modem_pcm_active);
    api::set_nrec(false).unwrap();
    api::route_output(AudioDevices::OUT_EARPIECE).unwrap();
    api::set_voice_volume(0.2).unwrap();
    assert_eq!(
        api::get_status().expect("status").call_path,
        CallAudioPath::Handset
    );
    assert!(api::drain_log().iter().any(|l| l.starts_with("call started")));
    assert_eq!(unsafe { aries_audio_device_set_mode(device, 0) }, 0);
    assert_eq!(api::get_status().expect("status").call, CallState::Idle);

    unsafe {
        aries_audio_device_close_input_stream(device, input);
        aries_audio_device_close_output_stream(device, out);
    }
    let status = api::get_status().expect("status");
    assert_eq!(status.output_standby, None);
    assert_eq!(status.input_standby, None);

    let shared = aries_audio_hw::global_device().expect("global device");
    assert_eq!(unsafe { aries_audio_device_close(device) }, 0);
    assert!(aries_audio_global_device().is_null());
    assert!(aries_audio_hw::global_device().is_none());
    assert!(api::get_status().is_none());
    // a handle taken before close keeps the device alive
    assert_eq!(shared.status().call, CallState::Idle);
}
