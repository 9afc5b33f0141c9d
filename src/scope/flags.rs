use std::fmt;

/// Call-scoped signal read by downstream stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceFlag {
    /// Bypass the query stage entirely.
    SkipQuery,
    /// The call only populates associations; leave the base destination alone.
    OnlyPreload,
}

impl InstanceFlag {
    /// Stable name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            InstanceFlag::SkipQuery => "skip_query",
            InstanceFlag::OnlyPreload => "only_preload",
        }
    }
}

impl fmt::Display for InstanceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Write-once set of [`InstanceFlag`]s.
///
/// Flags can be raised but never cleared within a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceFlags {
    skip_query: bool,
    only_preload: bool,
}

impl InstanceFlags {
    /// Raises `flag`. Returns false when it was already set.
    pub fn set(&mut self, flag: InstanceFlag) -> bool {
        let slot = match flag {
            InstanceFlag::SkipQuery => &mut self.skip_query,
            InstanceFlag::OnlyPreload => &mut self.only_preload,
        };
        !std::mem::replace(slot, true)
    }

    /// Whether `flag` has been raised.
    pub fn contains(&self, flag: InstanceFlag) -> bool {
        match flag {
            InstanceFlag::SkipQuery => self.skip_query,
            InstanceFlag::OnlyPreload => self.only_preload,
        }
    }

    /// First raised flag that bypasses the query stage.
    pub fn query_bypass(&self) -> Option<InstanceFlag> {
        if self.skip_query {
            Some(InstanceFlag::SkipQuery)
        } else if self.only_preload {
            Some(InstanceFlag::OnlyPreload)
        } else {
            None
        }
    }
}
