//! Mark–sweep cycle collection over the deferred queue and unreachable
//! cycles.
//!
//! Reference counting reclaims acyclic garbage immediately; this pass picks
//! up whatever the counts alone cannot prove dead. It is stop-the-world with
//! respect to the single interpreter thread and runs only between
//! instructions, at allocation sites and the return epilogue.

use super::{Handle, Heap, Object};

use std::collections::VecDeque;

impl Heap {
    /// Whether a collection pass is due: the deferred queue outgrew its
    /// threshold, or allocation pressure since the last pass passed its
    /// limit.
    pub fn should_collect(&self) -> bool {
        self.deferred.len() > self.params.deferred_threshold
            || self.bytes_since_gc > self.params.pressure_limit
    }

    /// Run one full mark–sweep pass.
    ///
    /// `roots` must cover every live reference into the heap: frame
    /// registers, global slots, up-value cells cached by live frames and
    /// the constant pools of registered functions. Every object not
    /// reachable from a root is finalized and freed; survivors keep their
    /// reference counts, minus the references the garbage held on them.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = Handle>) {
        // Mark, breadth-first from the roots.
        let mut worklist: VecDeque<Handle> = VecDeque::new();

        for root in roots {
            self.mark(root, &mut worklist);
        }

        while let Some(handle) = worklist.pop_front() {
            let mut children = Vec::new();
            match &self.cell(handle).object {
                Object::String(_) | Object::Function(_) => (),
                Object::Array(elems) => {
                    children.extend(elems.iter().filter_map(|value| value.handle()))
                }
                Object::Closure(closure) => children.extend(closure.upvalues.iter().copied()),
                Object::Upvalue(value) => children.extend(value.handle()),
            }

            for child in children {
                self.mark(child, &mut worklist);
            }
        }

        // Sweep every tracked object whose mark stayed clear.
        let garbage: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Some(cell) if !cell.header.is_marked() => Some(index),
                _ => None,
            })
            .collect();

        let mut freed_bytes = 0;
        for &index in &garbage {
            let cell = self.slots[index]
                .take()
                .expect("swept slot vanished mid-pass");

            // Survivors lose the references this object held on them; other
            // garbage is freed by this same pass and needs no adjustment.
            let mut inner = Vec::new();
            match cell.object {
                Object::String(_) | Object::Function(_) => (),
                Object::Array(elems) => {
                    inner.extend(elems.iter().filter_map(|value| value.handle()))
                }
                Object::Closure(closure) => inner.extend(closure.upvalues.iter().copied()),
                Object::Upvalue(value) => inner.extend(value.handle()),
            }

            for handle in inner {
                let survives = matches!(
                    &self.slots[handle.index()],
                    Some(cell) if cell.header.is_marked()
                );
                if survives {
                    self.decref(handle);
                }
            }

            freed_bytes += super::HEAP_HEADER_SIZE + cell.header.size();
            self.free_slot(Handle(index as u32), cell.header);
        }

        for slot in self.slots.iter_mut().flatten() {
            slot.header.clear_mark();
        }

        let slots = &self.slots;
        self.deferred
            .retain(|handle| slots[handle.index()].is_some());
        self.bytes_since_gc = 0;

        tracing::debug!(
            freed = garbage.len(),
            freed_bytes,
            live = self.live_objects,
            "cycle collection pass",
        );
    }

    fn mark(&mut self, handle: Handle, worklist: &mut VecDeque<Handle>) {
        let header = &mut self.cell_mut(handle).header;
        if !header.is_marked() {
            header.set_mark();
            worklist.push_back(handle);
        }
    }
}
