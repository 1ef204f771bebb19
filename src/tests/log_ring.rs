use crate::pcm::{PcmDirection, PcmError, PcmPort};
use crate::{HalError, LOG_BUFFER, LOG_CAPACITY, ModemError, push_log};

#[test]
fn log_ring_keeps_newest_lines() {
    for n in 0..LOG_CAPACITY + 10 {
        push_log(format!("line {n}"));
    }
    let guard = LOG_BUFFER.lock();
    assert!(guard.len() <= LOG_CAPACITY);
    let newest = format!("line {}", LOG_CAPACITY + 9);
    assert!(guard.iter().any(|line| *line == newest));
    assert!(!guard.iter().any(|line| line == "line 0"));
}

#[test]
fn errors_map_to_negative_errno() {
    assert_eq!(HalError::InvalidMode(9).errno(), -libc::EINVAL);
    assert_eq!(HalError::Busy("output").errno(), -libc::EBUSY);
    assert_eq!(HalError::NotSupported.errno(), -libc::ENOSYS);
    assert_eq!(HalError::from(ModemError::Unavailable).errno(), -libc::ENODEV);

    let open = PcmError::Open {
        card: 0,
        port: PcmPort::Hifi,
        direction: PcmDirection::Playback,
        reason: "busy".into(),
    };
    assert_eq!(HalError::from(open).errno(), -libc::ENOMEM);
    assert_eq!(HalError::from(PcmError::Io("xrun".into())).errno(), -libc::EIO);
}
