use crate::consts::N_MAX;
use crate::err::Error;

/// Bounded retry around a frame-level fallible operation.
///
/// Mirrors the distilled system's "re-listen if failed" decorator: any
/// error in `allow` is retried (up to `N_MAX` attempts total) while
/// everything else propagates immediately. `Error::ConnectionLost` always
/// propagates immediately, even if it were listed in `allow`, since
/// retrying a dead session can never succeed.
pub fn re_listen<T>(
    allow: &[fn(&Error) -> bool],
    mut op: impl FnMut() -> Result<T, Error>,
) -> Result<T, Error> {
    let mut attempts = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(Error::ConnectionLost) => return Err(Error::ConnectionLost),
            Err(e) if allow.iter().any(|f| f(&e)) => {
                attempts += 1;
                if attempts >= N_MAX {
                    return Err(Error::MaxRetransmissionAttempts);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

pub fn is_frame_level(e: &Error) -> bool {
    e.is_frame_level()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retries_allowed_errors_until_success() {
        let calls = Cell::new(0);
        let result = re_listen(&[is_frame_level], || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Error::NotAck)
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn propagates_connection_lost_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), Error> = re_listen(&[is_frame_level], || {
            calls.set(calls.get() + 1);
            Err(Error::ConnectionLost)
        });
        assert!(matches!(result, Err(Error::ConnectionLost)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn propagates_disallowed_errors_immediately() {
        let result: Result<(), Error> = re_listen(&[is_frame_level], || Err(Error::FileTooBig));
        assert!(matches!(result, Err(Error::FileTooBig)));
    }
}
