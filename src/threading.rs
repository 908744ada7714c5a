//! Thread scheduling helpers for the worker threads.
//!
//! Relative priorities follow the pipeline: Forwarder above the output workers, above the
//! classifier, above the generator, with the statistics reporter on top as a mostly-sleeping
//! control task. With real-time priorities enabled the levels map onto `SCHED_FIFO`/`SCHED_RR` on
//! Linux and QoS classes on macOS. Without them, Linux workers only lower their niceness relative
//! to each other, which needs no privileges.

use crate::metrics::WorkerRole;
use tracing::{debug, warn};

/// Scheduling level of a worker, 0 (lowest) to 4 (highest).
pub fn priority_level(role: WorkerRole) -> i32 {
    match role {
        WorkerRole::Stats => 4,
        WorkerRole::Forwarder => 3,
        WorkerRole::OutputPort(_) => 2,
        WorkerRole::Classifier => 1,
        WorkerRole::Generator => 0,
    }
}

/// Apply the scheduling class for `role` to the calling thread. Failures are logged and ignored.
pub fn apply_worker_priority(role: WorkerRole, realtime: bool) {
    let level = priority_level(role);
    if realtime {
        set_realtime_priority(level);
    } else {
        set_nice_level(level);
    }
}

#[cfg(target_os = "linux")]
fn set_realtime_priority(level: i32) {
    use libc::{pthread_self, pthread_setschedparam, sched_param, SCHED_FIFO, SCHED_RR};

    let (policy, sched_priority) = match level {
        4 => (SCHED_FIFO, 95),
        3 => (SCHED_FIFO, 90),
        2 => (SCHED_FIFO, 70),
        1 => (SCHED_RR, 30),
        _ => (SCHED_RR, 10),
    };

    // SAFETY: `sched_param` is plain data and `pthread_self` is always a valid handle.
    let result = unsafe {
        let mut param: sched_param = std::mem::zeroed();
        param.sched_priority = sched_priority;
        pthread_setschedparam(pthread_self(), policy, &param)
    };
    if result == 0 {
        debug!(level, sched_priority, "real-time priority applied");
    } else {
        warn!(level, errno = result, "could not apply real-time priority");
    }
}

#[cfg(target_os = "macos")]
fn set_realtime_priority(level: i32) {
    const QOS_CLASS_USER_INTERACTIVE: u32 = 0x21;
    const QOS_CLASS_USER_INITIATED: u32 = 0x19;
    const QOS_CLASS_UTILITY: u32 = 0x15;
    const QOS_CLASS_BACKGROUND: u32 = 0x09;

    extern "C" {
        fn pthread_set_qos_class_self_np(qos_class: u32, relative_priority: i32) -> i32;
    }

    let qos_class = match level {
        4 | 3 => QOS_CLASS_USER_INTERACTIVE,
        2 => QOS_CLASS_USER_INITIATED,
        1 => QOS_CLASS_UTILITY,
        _ => QOS_CLASS_BACKGROUND,
    };
    // SAFETY: plain FFI call acting on the current thread only.
    let result = unsafe { pthread_set_qos_class_self_np(qos_class, 0) };
    if result != 0 {
        warn!(level, errno = result, "could not apply QoS class");
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn set_realtime_priority(level: i32) {
    debug!(level, "real-time priorities unsupported on this platform");
}

/// Niceness offset per level: the highest level keeps the default niceness.
const fn nice_for(level: i32) -> i32 {
    4 - level
}

#[cfg(target_os = "linux")]
fn set_nice_level(level: i32) {
    let nice = nice_for(level);
    if nice == 0 {
        return;
    }
    // SAFETY: on Linux `setpriority(PRIO_PROCESS, tid)` targets only the calling thread.
    let result = unsafe {
        let tid = libc::syscall(libc::SYS_gettid) as libc::id_t;
        libc::setpriority(libc::PRIO_PROCESS, tid, nice)
    };
    if result != 0 {
        debug!(level, nice, "could not adjust thread niceness");
    }
}

#[cfg(not(target_os = "linux"))]
fn set_nice_level(level: i32) {
    let _ = nice_for(level);
}
