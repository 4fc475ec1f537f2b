//! Open Firmware (device tree) match tables.
//!
//! A match table is a static slice of [OfDeviceId] closed by [OfDeviceId::SENTINEL]. Every scan of
//! a table stops at the sentinel; entries placed after it are never seen.

/// One entry of a match table: a compatible string and an opaque word handed back on a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfDeviceId {
    pub compatible: &'static str,
    pub data: usize,
}

impl OfDeviceId {
    /// The empty entry terminating every table.
    pub const SENTINEL: OfDeviceId = OfDeviceId {
        compatible: "",
        data: 0,
    };

    pub const fn new(compatible: &'static str) -> OfDeviceId {
        OfDeviceId {
            compatible,
            data: 0,
        }
    }

    pub const fn with_data(compatible: &'static str, data: usize) -> OfDeviceId {
        OfDeviceId { compatible, data }
    }

    pub const fn is_sentinel(&self) -> bool {
        self.compatible.is_empty()
    }
}

/// Iterate the entries of `table` up to, not including, the sentinel.
pub fn of_table_iter(table: &'static [OfDeviceId]) -> impl Iterator<Item = &'static OfDeviceId> {
    table.iter().take_while(|id| !id.is_sentinel())
}

/// Find the entry of `table` matching a device that lists `compatibles`.
///
/// The device's compatible strings are tried in order, most specific first, and the first one
/// present in the table wins. Comparison ignores ASCII case.
pub fn of_match_device<S: AsRef<str>>(
    table: &'static [OfDeviceId],
    compatibles: &[S],
) -> Option<&'static OfDeviceId> {
    compatibles.iter().find_map(|compat| {
        of_table_iter(table).find(|id| id.compatible.eq_ignore_ascii_case(compat.as_ref()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    static TABLE: [OfDeviceId; 4] = [
        OfDeviceId::with_data("vendor,part-a", 1),
        OfDeviceId::with_data("vendor,part-b", 2),
        OfDeviceId::SENTINEL,
        OfDeviceId::with_data("vendor,after-sentinel", 3),
    ];

    #[test]
    fn iteration_stops_at_the_sentinel() {
        let names: std::vec::Vec<_> = of_table_iter(&TABLE).map(|id| id.compatible).collect();
        assert_eq!(names, ["vendor,part-a", "vendor,part-b"]);
    }

    #[test]
    fn entries_after_the_sentinel_never_match() {
        assert!(of_match_device(&TABLE, &["vendor,after-sentinel"]).is_none());
        assert!(of_match_device(&TABLE, &[""]).is_none());
    }

    #[test]
    fn most_specific_device_compatible_wins() {
        let id = of_match_device(&TABLE, &["vendor,part-b", "vendor,part-a"]).unwrap();
        assert_eq!(id.data, 2);
        let id = of_match_device(&TABLE, &["vendor,unknown", "vendor,part-a"]).unwrap();
        assert_eq!(id.data, 1);
        assert_eq!(of_match_device(&TABLE, &["VENDOR,Part-A"]).unwrap().data, 1);
        assert!(of_match_device::<&str>(&TABLE, &[]).is_none());
    }
}
