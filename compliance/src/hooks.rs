//! Tag-scoped policy hooks.
//!
//! The wire surface dispatches hooks on 4-byte selectors with encoded
//! argument blobs; here each hook signature is a typed [`HookCall`]
//! variant with named fields, and policy modules implement [`PolicyHook`]
//! against the registry. Hooks attach to a [`HookPoint`], optionally
//! scoped to a set of range tags.

use cert_types::{Address, MemberId, Tag};

/// The five hook attachment points, with their wire selectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// `0x70aaf928` — untagged pre-check for plain transfers.
    CheckTransfer,
    /// `0x5a5a8ad8` — tag-scoped check of each candidate range inside the
    /// transfer planner.
    CheckTransferRange,
    /// `0x2d79c6d7` — tag-scoped check for explicit index-range transfers.
    CheckRangeTransfer,
    /// `0xead529f5` — tag-scoped post-commit notification per range.
    TransferTokenRange,
    /// `0x8b5f1240` — pre-check for custodian internal transfers.
    TransferTokensCustodian,
}

impl HookPoint {
    pub fn selector(&self) -> [u8; 4] {
        match self {
            Self::CheckTransfer => [0x70, 0xaa, 0xf9, 0x28],
            Self::CheckTransferRange => [0x5a, 0x5a, 0x8a, 0xd8],
            Self::CheckRangeTransfer => [0x2d, 0x79, 0xc6, 0xd7],
            Self::TransferTokenRange => [0xea, 0xd5, 0x29, 0xf5],
            Self::TransferTokensCustodian => [0x8b, 0x5f, 0x12, 0x40],
        }
    }

    /// Whether hooks at this point gate the operation. Gating hooks abort
    /// on a `false` return; notification hooks fire after commit and
    /// their verdict is ignored.
    pub fn is_gating(&self) -> bool {
        !matches!(self, Self::TransferTokenRange)
    }
}

/// A typed hook invocation, one variant per hook signature.
#[derive(Clone, Debug)]
pub enum HookCall {
    CheckTransfer {
        auth_id: MemberId,
        member_ids: [MemberId; 2],
        from: Address,
        to: Address,
        ratings: [u8; 2],
        countries: [u16; 2],
        value: u64,
    },
    CheckTransferRange {
        auth_id: MemberId,
        member_ids: [MemberId; 2],
        from: Address,
        to: Address,
        ratings: [u8; 2],
        countries: [u16; 2],
        start: u64,
        stop: u64,
        tag: Tag,
    },
    CheckRangeTransfer {
        from: Address,
        to: Address,
        start: u64,
        stop: u64,
        tag: Tag,
    },
    TransferTokenRange {
        from: Address,
        to: Address,
        start: u64,
        stop: u64,
        tag: Tag,
    },
    TransferTokensCustodian {
        custodian: Address,
        from: Address,
        to: Address,
        value: u64,
    },
}

impl HookCall {
    pub fn point(&self) -> HookPoint {
        match self {
            Self::CheckTransfer { .. } => HookPoint::CheckTransfer,
            Self::CheckTransferRange { .. } => HookPoint::CheckTransferRange,
            Self::CheckRangeTransfer { .. } => HookPoint::CheckRangeTransfer,
            Self::TransferTokenRange { .. } => HookPoint::TransferTokenRange,
            Self::TransferTokensCustodian { .. } => HookPoint::TransferTokensCustodian,
        }
    }

    /// The range tag the call is scoped by, for the tag-scoped points.
    pub fn tag(&self) -> Option<Tag> {
        match self {
            Self::CheckTransferRange { tag, .. }
            | Self::CheckRangeTransfer { tag, .. }
            | Self::TransferTokenRange { tag, .. } => Some(*tag),
            _ => None,
        }
    }
}

/// A policy module attached to one or more hook points.
pub trait PolicyHook {
    /// Handle a hook invocation. At gating points a `false` return aborts
    /// the operation; at notification points the return value is ignored.
    fn on_call(&mut self, call: &HookCall) -> bool;
}

struct RegisteredHook {
    point: HookPoint,
    /// `None` attaches to every tag; at tag-scoped points a `Some` list
    /// only fires for matching tags.
    tags: Option<Vec<Tag>>,
    hook: Box<dyn PolicyHook>,
}

/// Registry of attached policy hooks.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<RegisteredHook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Attach a hook at `point`, optionally scoped to `tags`.
    pub fn attach(&mut self, point: HookPoint, tags: Option<Vec<Tag>>, hook: Box<dyn PolicyHook>) {
        self.hooks.push(RegisteredHook { point, tags, hook });
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run a gating hook point; `true` iff every matching hook allows.
    pub fn check(&mut self, call: &HookCall) -> bool {
        debug_assert!(call.point().is_gating());
        let tag = call.tag();
        for h in &mut self.hooks {
            if h.point == call.point() && Self::tag_matches(&h.tags, tag) && !h.hook.on_call(call) {
                return false;
            }
        }
        true
    }

    /// Fire a notification hook point; verdicts are ignored.
    pub fn notify(&mut self, call: &HookCall) {
        debug_assert!(!call.point().is_gating());
        let tag = call.tag();
        for h in &mut self.hooks {
            if h.point == call.point() && Self::tag_matches(&h.tags, tag) {
                let _ = h.hook.on_call(call);
            }
        }
    }

    fn tag_matches(scope: &Option<Vec<Tag>>, tag: Option<Tag>) -> bool {
        match (scope, tag) {
            (None, _) => true,
            (Some(tags), Some(t)) => tags.contains(&t),
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        allow: bool,
        calls: usize,
    }

    impl PolicyHook for Fixed {
        fn on_call(&mut self, _call: &HookCall) -> bool {
            self.calls += 1;
            self.allow
        }
    }

    fn range_call(tag: Tag) -> HookCall {
        HookCall::CheckRangeTransfer {
            from: Address::new([1; 20]),
            to: Address::new([2; 20]),
            start: 1,
            stop: 10,
            tag,
        }
    }

    #[test]
    fn empty_registry_allows() {
        let mut reg = HookRegistry::new();
        assert!(reg.check(&range_call(Tag::ZERO)));
    }

    #[test]
    fn denying_hook_blocks() {
        let mut reg = HookRegistry::new();
        reg.attach(
            HookPoint::CheckRangeTransfer,
            None,
            Box::new(Fixed { allow: false, calls: 0 }),
        );
        assert!(!reg.check(&range_call(Tag::ZERO)));
    }

    #[test]
    fn tag_scope_filters_calls() {
        let mut reg = HookRegistry::new();
        reg.attach(
            HookPoint::CheckRangeTransfer,
            Some(vec![Tag::from(0xBEEF)]),
            Box::new(Fixed { allow: false, calls: 0 }),
        );
        // A different tag never reaches the scoped hook.
        assert!(reg.check(&range_call(Tag::ZERO)));
        assert!(!reg.check(&range_call(Tag::from(0xBEEF))));
    }

    #[test]
    fn selector_round_trip() {
        assert_eq!(HookPoint::CheckTransfer.selector(), [0x70, 0xaa, 0xf9, 0x28]);
        assert_eq!(HookPoint::TransferTokenRange.selector(), [0xea, 0xd5, 0x29, 0xf5]);
        assert!(!HookPoint::TransferTokenRange.is_gating());
        assert!(HookPoint::TransferTokensCustodian.is_gating());
    }
}
