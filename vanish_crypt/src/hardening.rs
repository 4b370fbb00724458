//! Process-wide hardening applied once at startup

use vanish_types::errors::Error;

/// Sets the core dump size limit to zero so a crash never writes payloads to disk.
/// A no-op on platforms without `setrlimit`
pub fn disable_core_dumps() -> Result<(), Error> {
    #[cfg(target_family = "unix")]
    {
        let limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };

        if unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) } != 0 {
            return Err(Error::resource(format!(
                "Unable to disable core dumps: {}",
                std::io::Error::last_os_error()
            )));
        }

        log::trace!(target: "vanish", "Core dumps disabled");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    #[cfg(target_family = "unix")]
    fn core_limit_is_zero_afterwards() {
        vanish_logging::setup_log();
        super::disable_core_dumps().unwrap();
        let mut limit = libc::rlimit {
            rlim_cur: 1,
            rlim_max: 1,
        };
        assert_eq!(unsafe { libc::getrlimit(libc::RLIMIT_CORE, &mut limit) }, 0);
        assert_eq!(limit.rlim_cur, 0);
    }
}
