//! The shadow rule table: a flat, authoritative list of every configured
//! IPv4 prefix, independent of how the stride trie happens to have
//! replicated it across node entries. Removal relies on this table to find
//! the best surviving less-specific prefix once a more-specific one is
//! withdrawn, since the trie's own entries no longer say which prefix they
//! came from once overwritten.

use log::warn;

use crate::error::LpmError;
use crate::next_hop::NextHop;
use crate::Vrf;

/// Default number of rule slots, matching `ROUTE_LIST_SIZE` in the reference
/// implementation.
pub const DEFAULT_ROUTE_LIST_SIZE: usize = 65536;

#[derive(Clone, Copy)]
struct ShadowRule<D> {
    used: bool,
    vrf: Vrf,
    /// Host-order, canonicalized to `masklen` high bits.
    addr: u32,
    masklen: u8,
    data: D,
}

impl<D: NextHop> Default for ShadowRule<D> {
    fn default() -> Self {
        ShadowRule {
            used: false,
            vrf: 0,
            addr: 0,
            masklen: 0,
            data: D::default(),
        }
    }
}

/// A match returned by [`ShadowRuleTable::find_prefix_match`].
#[derive(Clone, Copy)]
pub(crate) struct ShadowMatch<D> {
    pub addr: u32,
    pub masklen: u8,
    pub data: D,
}

pub(crate) struct ShadowRuleTable<D> {
    rules: Box<[ShadowRule<D>]>,
}

impl<D: NextHop> ShadowRuleTable<D> {
    pub(crate) fn new(capacity: usize) -> Self {
        ShadowRuleTable {
            rules: vec![ShadowRule::default(); capacity.max(1)].into_boxed_slice(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.rules.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.rules.iter().filter(|r| r.used).count()
    }

    /// Linear scan matching all three key fields among used slots.
    pub(crate) fn find(&self, vrf: Vrf, addr: u32, masklen: u8) -> Option<usize> {
        self.rules
            .iter()
            .position(|r| r.used && r.vrf == vrf && r.addr == addr && r.masklen == masklen)
    }

    pub(crate) fn data_at(&self, index: usize) -> D {
        self.rules[index].data
    }

    /// Overwrites the existing rule's data if the prefix is already
    /// configured; otherwise reserves the first free slot. Logs and returns
    /// `RuleTableFull` if there is no free slot.
    pub(crate) fn add(
        &mut self,
        vrf: Vrf,
        addr: u32,
        masklen: u8,
        data: D,
    ) -> Result<(), LpmError> {
        if let Some(idx) = self.find(vrf, addr, masklen) {
            self.rules[idx].data = data;
            return Ok(());
        }
        match self.rules.iter().position(|r| !r.used) {
            Some(idx) => {
                self.rules[idx] = ShadowRule {
                    used: true,
                    vrf,
                    addr,
                    masklen,
                    data,
                };
                Ok(())
            }
            None => {
                warn!("shadow rule table full, dropping rule {vrf}/{addr:#x}/{masklen}");
                Err(LpmError::RuleTableFull)
            }
        }
    }

    /// Clears `used` on the matching slot, if any.
    pub(crate) fn remove(&mut self, vrf: Vrf, addr: u32, masklen: u8) -> Option<D> {
        let idx = self.find(vrf, addr, masklen)?;
        let data = self.rules[idx].data;
        self.rules[idx].used = false;
        Some(data)
    }

    pub(crate) fn clear(&mut self, index: usize) {
        self.rules[index].used = false;
    }

    /// Among rules in `vrf`, finds the one with the greatest `masklen'`
    /// satisfying `low < masklen' <= masklen` whose top `masklen'` bits match
    /// `addr`. Ties are broken by the latest-encountered (highest-index)
    /// slot, matching the reference C's simple forward scan keeping the last
    /// best candidate.
    pub(crate) fn find_prefix_match(
        &self,
        vrf: Vrf,
        addr: u32,
        masklen: u8,
        low: u8,
    ) -> Option<ShadowMatch<D>> {
        let mut best: Option<usize> = None;
        // Strict lower bound: `low < rule_masklen' <= masklen`. A rule whose
        // masklen equals `low` belongs to the level above and must not be
        // eligible here, matching the original's `low_int = low + 1` before
        // its equivalent scan.
        let mut best_masklen = low.saturating_add(1);
        for (idx, rule) in self.rules.iter().enumerate() {
            if !rule.used || rule.vrf != vrf {
                continue;
            }
            if rule.masklen < best_masklen || rule.masklen > masklen {
                continue;
            }
            if top_bits_match(rule.addr, addr, rule.masklen) {
                best_masklen = rule.masklen;
                best = Some(idx);
            }
        }
        best.map(|idx| ShadowMatch {
            addr: self.rules[idx].addr,
            masklen: self.rules[idx].masklen,
            data: self.rules[idx].data,
        })
    }

    /// Emits every used rule for `vrf`, in storage order, via `sink`.
    pub(crate) fn for_each(&self, vrf: Vrf, mut sink: impl FnMut(u32, u8, &D)) {
        for rule in self.rules.iter() {
            if rule.used && rule.vrf == vrf {
                sink(rule.addr, rule.masklen, &rule.data);
            }
        }
    }
}

fn top_bits_match(a: u32, b: u32, bits: u8) -> bool {
    if bits == 0 {
        return true;
    }
    (a >> (32 - bits as u32)) == (b >> (32 - bits as u32))
}
