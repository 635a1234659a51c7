//! Small free-standing helpers shared by the rest of the crate.

use std::mem::MaybeUninit;

/// Divides `a` by `b`, rounding up.
pub const fn ceil_division(a: u32, b: u32) -> u32 {
    a.div_ceil(b)
}

/// Formats the current local time as `YYYY-MM-DD HH:MM:SS`, the layout the on-disk
/// timestamp fields expect. The result is always exactly 19 bytes, well within the
/// 25-byte field.
pub fn timestamp_now() -> String {
    let mut tm: libc::tm = unsafe { MaybeUninit::zeroed().assume_init() };
    unsafe {
        let secs = libc::time(std::ptr::null_mut());
        libc::localtime_r(&secs, &mut tm);
    }
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        tm.tm_year + 1900,
        tm.tm_mon + 1,
        tm.tm_mday,
        tm.tm_hour,
        tm.tm_min,
        tm.tm_sec,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ceil_division_rounds_up() {
        assert_eq!(ceil_division(0, 250), 0);
        assert_eq!(ceil_division(1, 250), 1);
        assert_eq!(ceil_division(250, 250), 1);
        assert_eq!(ceil_division(251, 250), 2);
        assert_eq!(ceil_division(500, 250), 2);
    }

    #[test]
    fn timestamp_has_expected_shape() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 19);
        assert_eq!(ts.as_bytes()[4], b'-');
        assert_eq!(ts.as_bytes()[7], b'-');
        assert_eq!(ts.as_bytes()[10], b' ');
        assert_eq!(ts.as_bytes()[13], b':');
        assert_eq!(ts.as_bytes()[16], b':');
    }
}
