use std::{cell::RefCell, ffi::OsStr};

/// Filter used when `LC3VM_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Clone)]
struct Env {
    minimal: bool,
    log_filter: Option<String>,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        minimal: var_is("LC3VM_MINIMAL", "1"),
        log_filter: std::env::var("LC3VM_LOG").ok().filter(|v| !v.is_empty()),
    };
    set_env(value);
}

/// Whether status output is suppressed regardless of `--minimal`.
pub fn is_minimal_forced() -> bool {
    with_env(|env| env.minimal)
}

/// `tracing` filter directives, in `EnvFilter` syntax.
pub fn log_filter() -> String {
    with_env(|env| {
        env.log_filter
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
    })
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let Some(env) = env.as_ref() else {
            panic!("tried to access environment state before initialization");
        };
        callback(env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}
