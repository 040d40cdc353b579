// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Panic trapping around step and hook invocations.

use std::{
    cell::RefCell,
    panic::{self, AssertUnwindSafe, PanicHookInfo},
    sync::{Mutex, PoisonError},
};

use once_cell::sync::Lazy;

use crate::error::Failure;

type Hook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync>;

/// Refcounted global hook state. The hook is process-wide, while runs may
/// overlap (parallel test binaries spin up several suites), so the
/// previous hook is only restored when the last activation drops.
static TRAP: Lazy<Mutex<TrapState>> = Lazy::new(Mutex::default);

#[derive(Default)]
struct TrapState {
    active: usize,
    previous: Option<Hook>,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicDetails>> = const { RefCell::new(None) };
}

struct PanicDetails {
    payload: String,
    location: Option<String>,
}

/// Keeps the trap's panic hook installed while alive.
pub(crate) struct Guard(());

impl Drop for Guard {
    fn drop(&mut self) {
        let mut state = TRAP.lock().unwrap_or_else(PoisonError::into_inner);
        state.active -= 1;
        if state.active == 0 {
            let previous = state.previous.take();
            drop(state);
            if let Some(previous) = previous {
                panic::set_hook(previous);
            }
        }
    }
}

/// Installs the capturing panic hook (once, refcounted) and returns a
/// [`Guard`] keeping it installed.
pub(crate) fn activate() -> Guard {
    let mut state = TRAP.lock().unwrap_or_else(PoisonError::into_inner);
    state.active += 1;
    if state.active == 1 {
        state.previous = Some(panic::take_hook());
        panic::set_hook(Box::new(|info| {
            LAST_PANIC.with(|cell| {
                *cell.borrow_mut() = Some(PanicDetails {
                    payload: coerce_payload(info.payload()),
                    location: info.location().map(ToString::to_string),
                });
            });
        }));
    }
    Guard(())
}

/// Runs `f`, converting a panic into a [`Failure`] carrying the payload
/// and, when the trap hook saw it, the panic's source location.
pub(crate) fn catch<T>(f: impl FnOnce() -> T) -> Result<T, Failure> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let details = LAST_PANIC.with(|cell| cell.borrow_mut().take());
        match details {
            Some(PanicDetails {
                payload,
                location: Some(location),
            }) => Failure::msg(format!("panicked at {location}: {payload}")),
            Some(PanicDetails { payload, .. }) => {
                Failure::msg(format!("panicked: {payload}"))
            }
            None => Failure::msg(format!("panicked: {}", coerce_payload(&*payload))),
        }
    })
}

fn coerce_payload(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "(unresolvable panic payload)".to_owned()
    }
}

#[cfg(test)]
mod spec {
    use super::*;

    #[test]
    fn passing_closure_is_transparent() {
        let _guard = activate();

        assert_eq!(catch(|| 7).unwrap(), 7);
    }

    #[test]
    fn panic_becomes_a_failure_with_location() {
        let _guard = activate();

        let failure = catch(|| panic!("basket overflow")).unwrap_err();

        let message = failure.to_string();
        assert!(message.contains("basket overflow"), "got: {message}");
        assert!(message.contains("trap.rs"), "got: {message}");
    }

    #[test]
    fn payload_without_active_hook_is_still_captured() {
        // No `activate()` here: the default hook stays, `catch` falls back
        // to the raw payload.
        let failure = catch(|| panic!("{}", "plain payload")).unwrap_err();

        assert!(failure.to_string().contains("plain payload"));
    }

    #[test]
    fn nested_activations_keep_the_hook() {
        let outer = activate();
        {
            let _inner = activate();
        }
        let failure = catch(|| panic!("still trapped")).unwrap_err();

        assert!(failure.to_string().contains("trap.rs"));
        drop(outer);
    }
}
