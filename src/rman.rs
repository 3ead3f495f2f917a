//! Resource Manager: allocation of linear address ranges.
//!
//! A generic allocator for one-dimensional numeric resources (MMIO windows,
//! port-I/O ranges, DMA channels, IRQ numbers, ...). Clients donate address
//! ranges to a [`ResourceManager`] via [`ResourceManager::manage_region`],
//! then carve reservations out of the donated pool with
//! [`ResourceManager::reserve`]. Released reservations are coalesced back
//! into their free neighbours automatically.
//!
//! Grounded on the FreeBSD-style resource manager (`rman_reserve_resource`,
//! `rman_release_resource`, `rman_manage_region`): the placement, splitting
//! and coalescing algorithms below reproduce its control flow and overflow
//! checks line for line, recast as safe Rust over a `Vec` instead of an
//! intrusive `TAILQ`.

use alloc::{sync::Arc, vec::Vec};

use bitflags::bitflags;
use spin::Mutex;

use crate::config::ADDR_MAX;

/// The address type resources are allocated over. Platform-sized and
/// unsigned; the top of this range is [`ADDR_MAX`].
pub type Addr = u64;

bitflags! {
    /// Caller-defined bits preserved verbatim by the resource manager.
    ///
    /// These never encode `RESERVED`/`ACTIVE`; that state is structural
    /// (see [`ResourceState`]) and is not representable as a stray bit a
    /// caller could accidentally clear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ResourceFlags: u32 {
        const SHAREABLE = 0b0001;
        const PREFETCHABLE = 0b0010;
    }
}

/// Structural state of a [`Resource`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceState {
    /// Available for a future `reserve`.
    Free,
    /// Handed to a client; `active` mirrors the spec's `ACTIVE` flag.
    Reserved {
        active: bool,
        client_flags: ResourceFlags,
    },
}

impl ResourceState {
    fn is_reserved(&self) -> bool {
        matches!(self, ResourceState::Reserved { .. })
    }
}

/// A single entry in the resource manager's ordered span list.
#[derive(Debug, Clone, Copy)]
struct Entry {
    id: u64,
    start: Addr,
    end: Addr,
    state: ResourceState,
}

impl Entry {
    fn size(&self) -> Addr {
        self.end - self.start + 1
    }
}

struct Inner {
    /// Strictly increasing, non-overlapping by `start`. See module invariants.
    entries: Vec<Entry>,
    next_id: u64,
}

impl Inner {
    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// A generic linear-address-range allocator.
///
/// Cloning a `ResourceManager` handle (it is reference-counted internally
/// via reservations, see [`Resource`]) never duplicates state; all handles
/// refer to the same underlying table.
pub struct ResourceManager {
    name: &'static str,
    inner: Mutex<Inner>,
}

impl ResourceManager {
    /// Create a new, empty resource manager.
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                next_id: 1,
            }),
        })
    }

    /// Convenience constructor equivalent to `new` followed by
    /// `manage_region` with `resource`'s span.
    pub fn from_resource(name: &'static str, resource: &Resource) -> Arc<Self> {
        let rm = Self::new(name);
        rm.manage_region(resource.start, resource.size());
        rm
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Donate `[start, start + size - 1]` to the free pool.
    ///
    /// # Panics
    ///
    /// Panics if the new range overlaps any existing region, or if
    /// `start + size - 1` would overflow `Addr`.
    pub fn manage_region(&self, start: Addr, size: Addr) {
        assert!(size > 0, "manage_region: zero-size region");
        let end = start
            .checked_add(size - 1)
            .expect("manage_region: range overflows address space");

        let mut inner = self.inner.lock();

        // Find the first existing entry that is not strictly below the new
        // range (treat `end == ADDR_MAX` as the walk terminator to dodge
        // the overflow in `cur.end + 1`).
        let pos = inner.entries.iter().position(|cur| {
            cur.end == ADDR_MAX || cur.end + 1 >= start
        });

        let Some(pos) = pos else {
            let id = inner.alloc_id();
            inner.entries.push(Entry {
                id,
                start,
                end,
                state: ResourceState::Free,
            });
            return;
        };

        let cur = inner.entries[pos];
        assert!(!overlaps(cur.start, cur.end, start, end), "manage_region: overlaps existing region");

        let next = inner.entries.get(pos + 1).copied();
        let mut merge_next = false;
        if let Some(next) = next {
            assert!(!overlaps(next.start, next.end, start, end), "manage_region: overlaps existing region");
            merge_next = end != ADDR_MAX && end + 1 == next.start && !next.state.is_reserved();
        }

        let merge_cur = cur.end != ADDR_MAX && cur.end + 1 == start && !cur.state.is_reserved();

        if merge_cur && merge_next {
            let next = next.unwrap();
            inner.entries[pos].end = next.end;
            inner.entries.remove(pos + 1);
        } else if merge_cur {
            inner.entries[pos].end = end;
        } else if merge_next {
            inner.entries[pos + 1].start = start;
        } else if cur.end < start {
            let id = inner.alloc_id();
            inner.entries.insert(
                pos + 1,
                Entry {
                    id,
                    start,
                    end,
                    state: ResourceState::Free,
                },
            );
        } else {
            let id = inner.alloc_id();
            inner.entries.insert(
                pos,
                Entry {
                    id,
                    start,
                    end,
                    state: ResourceState::Free,
                },
            );
        }
    }

    /// Attempt to carve out `count` contiguous units within `[start, end]`,
    /// aligned to `alignment` (which must be a power of two, or `1`).
    ///
    /// Returns `None` if no placement satisfies the constraints.
    pub fn reserve(
        self: &Arc<Self>,
        start: Addr,
        end: Addr,
        count: Addr,
        alignment: Addr,
        client_flags: ResourceFlags,
    ) -> Option<Resource> {
        assert!(count > 0, "reserve: count must be positive");
        assert!(
            alignment == 1 || alignment.is_power_of_two(),
            "reserve: alignment must be a power of two"
        );
        let span_end = start
            .checked_add(count - 1)
            .expect("reserve: start + count - 1 overflows address space");
        assert!(span_end <= end, "reserve: requested span exceeds [start, end]");

        let mut inner = self.inner.lock();

        for i in 0..inner.entries.len() {
            let r = inner.entries[i];

            // Skip regions entirely below the requested window.
            if r.end < span_end {
                continue;
            }
            // Skip already-reserved regions.
            if r.state.is_reserved() {
                continue;
            }
            // Stop once we've gone past the feasible window: since
            // span_end <= end, `end - count + 1` never underflows here.
            if r.start > end - (count - 1) {
                break;
            }
            // Stop if the alignment roundup below would overflow.
            if r.start > ADDR_MAX - alignment + 1 {
                break;
            }

            let new_start = roundup(core::cmp::max(r.start, start), alignment);
            let new_end = match new_start.checked_add(count - 1) {
                Some(v) => v,
                None => break,
            };
            if new_end < new_start {
                break;
            }
            if new_end > r.end {
                continue;
            }
            if new_end > end {
                break;
            }

            let state = ResourceState::Reserved {
                active: false,
                client_flags,
            };

            if r.size() == count {
                inner.entries[i].state = state;
                return Some(Resource {
                    rman: self.clone(),
                    id: r.id,
                    start: r.start,
                    end: r.end,
                });
            }

            let id = inner.alloc_id();
            let carve = Entry {
                id,
                start: new_start,
                end: new_end,
                state,
            };

            let mut insert_at = i + 1;
            let mut to_insert = Vec::with_capacity(2);
            if new_start > r.start {
                // Left remainder keeps the original entry in place.
                inner.entries[i].end = new_start - 1;
            } else {
                // Carve starts exactly at r.start: original entry becomes
                // the right remainder (or is replaced entirely below).
                insert_at = i;
            }
            to_insert.push(carve);
            if new_end < r.end {
                to_insert.push(Entry {
                    id: inner.alloc_id(),
                    start: new_end + 1,
                    end: r.end,
                    state: ResourceState::Free,
                });
            }

            if insert_at == i {
                // Carve (and possibly right remainder) replace r entirely.
                inner.entries.remove(i);
            }
            for (offset, e) in to_insert.into_iter().enumerate() {
                inner.entries.insert(insert_at + offset, e);
            }

            return Some(Resource {
                rman: self.clone(),
                id: carve.id,
                start: carve.start,
                end: carve.end,
            });
        }

        None
    }

    /// Mark `r` active (client has enabled it).
    pub fn activate(&self, r: &Resource) {
        let mut inner = self.inner.lock();
        let e = find_mut(&mut inner.entries, r.id);
        match &mut e.state {
            ResourceState::Reserved { active, .. } => *active = true,
            ResourceState::Free => unreachable!("activate: resource not reserved"),
        }
    }

    /// Clear `r`'s active bit.
    pub fn deactivate(&self, r: &Resource) {
        let mut inner = self.inner.lock();
        let e = find_mut(&mut inner.entries, r.id);
        match &mut e.state {
            ResourceState::Reserved { active, .. } => *active = false,
            ResourceState::Free => unreachable!("deactivate: resource not reserved"),
        }
    }

    /// Release `r`, coalescing with adjacent non-reserved neighbours.
    ///
    /// # Panics
    ///
    /// Panics if `r` is still active.
    pub fn release(&self, r: Resource) {
        let mut inner = self.inner.lock();
        let pos = inner
            .entries
            .iter()
            .position(|e| e.id == r.id)
            .expect("release: resource not found in its manager");

        match inner.entries[pos].state {
            ResourceState::Reserved { active: true, .. } => {
                panic!("release: releasing an active resource")
            }
            ResourceState::Reserved { active: false, .. } => {}
            ResourceState::Free => panic!("release: resource already free"),
        }

        let cur = inner.entries[pos];
        let prev_ok = pos > 0 && {
            let prev = inner.entries[pos - 1];
            !prev.state.is_reserved() && prev.end + 1 == cur.start
        };
        let next_ok = pos + 1 < inner.entries.len() && {
            let next = inner.entries[pos + 1];
            !next.state.is_reserved() && cur.end + 1 == next.start
        };

        match (prev_ok, next_ok) {
            (true, true) => {
                let next_end = inner.entries[pos + 1].end;
                inner.entries[pos - 1].end = next_end;
                inner.entries.remove(pos + 1);
                inner.entries.remove(pos);
            }
            (true, false) => {
                inner.entries[pos - 1].end = cur.end;
                inner.entries.remove(pos);
            }
            (false, true) => {
                let next_start = cur.start;
                inner.entries[pos + 1].start = next_start;
                inner.entries.remove(pos);
            }
            (false, false) => {
                inner.entries[pos].state = ResourceState::Free;
            }
        }
    }

    /// Destroy an empty resource manager.
    ///
    /// # Panics
    ///
    /// Panics if any resource is still reserved.
    pub fn fini(&self) {
        let mut inner = self.inner.lock();
        assert!(
            inner.entries.iter().all(|e| !e.state.is_reserved()),
            "fini: resource manager has reserved resources"
        );
        inner.entries.clear();
    }

    /// Snapshot the manager's free/reserved spans, in order, for
    /// diagnostics and testing. `(start, end, reserved)`.
    pub fn spans(&self) -> Vec<(Addr, Addr, bool)> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|e| (e.start, e.end, e.state.is_reserved()))
            .collect()
    }
}

fn find_mut(entries: &mut [Entry], id: u64) -> &mut Entry {
    entries
        .iter_mut()
        .find(|e| e.id == id)
        .expect("resource handle outlived its manager entry")
}

fn overlaps(a_start: Addr, a_end: Addr, b_start: Addr, b_end: Addr) -> bool {
    a_start <= b_end && a_end >= b_start
}

fn roundup(value: Addr, alignment: Addr) -> Addr {
    if alignment <= 1 {
        return value;
    }
    (value + (alignment - 1)) & !(alignment - 1)
}

/// A reserved span handed out by [`ResourceManager::reserve`].
///
/// Holds a cheap, non-owning reference back to its manager (an `Arc` clone,
/// not a second owner of the span's state — the manager's internal table is
/// the sole owner) so that `activate`/`deactivate`/`release` can be called
/// directly on the handle.
pub struct Resource {
    rman: Arc<ResourceManager>,
    id: u64,
    start: Addr,
    end: Addr,
}

impl Resource {
    pub fn start(&self) -> Addr {
        self.start
    }

    pub fn end(&self) -> Addr {
        self.end
    }

    pub fn size(&self) -> Addr {
        self.end - self.start + 1
    }

    pub fn manager(&self) -> &Arc<ResourceManager> {
        &self.rman
    }

    pub fn activate(&self) {
        self.rman.activate(self)
    }

    pub fn deactivate(&self) {
        self.rman.deactivate(self)
    }

    /// Consume this handle, releasing it back to its manager.
    pub fn release(self) {
        let rman = self.rman.clone();
        rman.release(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn donate_reserve_release_scenario() {
        let rm = ResourceManager::new("test");
        rm.manage_region(0x1000, 0x1000);

        let r1 = rm
            .reserve(0x1000, 0x1FFF, 0x100, 0x100, ResourceFlags::empty())
            .unwrap();
        assert_eq!((r1.start(), r1.end()), (0x1000, 0x10FF));

        let r2 = rm
            .reserve(0x1000, 0x1FFF, 0x200, 0x200, ResourceFlags::empty())
            .unwrap();
        assert_eq!((r2.start(), r2.end()), (0x1200, 0x13FF));

        r1.release();
        let spans = rm.spans();
        assert!(spans.contains(&(0x1000, 0x11FF, false)));
    }

    #[test]
    fn alignment_overflow_returns_none() {
        let rm = ResourceManager::new("test");
        // One past a 0x1000 alignment boundary, so `roundup` would have to
        // cross `ADDR_MAX` to satisfy the alignment: the overflow guard
        // must stop the walk before ever computing that roundup.
        let base = ADDR_MAX - 0xFFE;
        rm.manage_region(base, 0xFFF);
        let res = rm.reserve(base, ADDR_MAX, 0x100, 0x1000, ResourceFlags::empty());
        assert!(res.is_none());
    }

    #[test]
    fn merge_three_on_release() {
        let rm = ResourceManager::new("test");
        rm.manage_region(0, 0x100);
        rm.manage_region(0x200, 0x100);
        rm.manage_region(0x100, 0x100);

        let r = rm
            .reserve(0x100, 0x1FF, 0x100, 1, ResourceFlags::empty())
            .unwrap();
        r.release();

        let spans = rm.spans();
        assert_eq!(spans, alloc::vec![(0, 0x2FF, false)]);
    }

    #[test]
    fn reserve_idempotent_on_failure() {
        let rm = ResourceManager::new("test");
        rm.manage_region(0, 0xFF);
        rm.reserve(0, 0xFF, 0x80, 1, ResourceFlags::empty()).unwrap();
        let before = rm.spans();
        // The remaining free span is too small for this request; no
        // placement fits anywhere in `[0, 0xFF]`.
        let res = rm.reserve(0, 0xFF, 0x80, 1, ResourceFlags::empty());
        assert!(res.is_none());
        assert_eq!(before, rm.spans());
    }

    #[test]
    fn placement_respects_constraints() {
        let rm = ResourceManager::new("test");
        rm.manage_region(0, 0xFFFF);
        let r = rm
            .reserve(0x10, 0xFF00, 0x40, 0x40, ResourceFlags::SHAREABLE)
            .unwrap();
        assert!(r.start() >= 0x10);
        assert!(r.end() <= 0xFF00);
        assert_eq!(r.size(), 0x40);
        assert_eq!(r.start() % 0x40, 0);
    }

    #[test]
    #[should_panic(expected = "releasing an active resource")]
    fn release_while_active_panics() {
        let rm = ResourceManager::new("test");
        rm.manage_region(0, 0xFF);
        let r = rm.reserve(0, 0xFF, 0x10, 1, ResourceFlags::empty()).unwrap();
        r.activate();
        r.release();
    }

    #[test]
    #[should_panic(expected = "has reserved resources")]
    fn fini_with_reserved_resource_panics() {
        let rm = ResourceManager::new("test");
        rm.manage_region(0, 0xFF);
        let _r = rm.reserve(0, 0xFF, 0x10, 1, ResourceFlags::empty()).unwrap();
        rm.fini();
    }

    #[test]
    #[should_panic(expected = "overlaps existing region")]
    fn manage_region_overlap_panics() {
        let rm = ResourceManager::new("test");
        rm.manage_region(0, 0xFF);
        rm.manage_region(0x80, 0x80);
    }

    #[test]
    fn ordering_and_no_adjacent_free_regions() {
        let rm = ResourceManager::new("test");
        rm.manage_region(0, 0xFFF);
        let mut held = Vec::new();
        for _ in 0..4 {
            held.push(rm.reserve(0, 0xFFF, 0x100, 1, ResourceFlags::empty()).unwrap());
        }
        // Release every other reservation; no coalescing is possible yet.
        held.remove(1).release();
        let spans = rm.spans();
        for w in spans.windows(2) {
            assert!(w[0].1 < w[1].0, "entries must be strictly increasing");
        }
        for w in spans.windows(2) {
            if !w[0].2 && !w[1].2 {
                assert_ne!(w[0].1 + 1, w[1].0, "adjacent free regions must be merged");
            }
        }
    }

    #[test]
    fn conservation_across_manage_reserve_release() {
        let rm = ResourceManager::new("test");
        let donated: Addr = 0x1000;
        rm.manage_region(0, donated);

        let total = |rm: &Arc<ResourceManager>| -> Addr {
            rm.spans().iter().map(|&(start, end, _)| end - start + 1).sum()
        };
        assert_eq!(total(&rm), donated, "freshly donated region must sum to its full size");

        let r1 = rm.reserve(0, 0xFFF, 0x100, 1, ResourceFlags::empty()).unwrap();
        let r2 = rm.reserve(0, 0xFFF, 0x80, 0x10, ResourceFlags::empty()).unwrap();
        assert_eq!(
            total(&rm),
            donated,
            "splitting a free span into free + reserved pieces must not change the total"
        );

        r1.release();
        assert_eq!(total(&rm), donated, "releasing must not change the total");

        r2.release();
        assert_eq!(
            total(&rm),
            donated,
            "releasing and coalescing back to one free span must not change the total"
        );
        let spans = rm.spans();
        assert_eq!(spans.len(), 1, "everything must have coalesced back into a single free span");
        assert_eq!(spans[0], (0, 0xFFF, false));
    }
}
