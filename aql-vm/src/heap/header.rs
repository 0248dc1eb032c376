use bitflags::bitflags;

bitflags! {
    /// Flag bits of a heap object header.
    pub struct HeaderFlags: u8 {
        /// Reachability color of the current cycle-collection pass.
        const MARK = 0x01;
        /// The object's type may participate in reference cycles; a
        /// refcount of zero defers reclamation to the cycle collector.
        const CYCLIC = 0x02;
    }
}

/// Type tag of a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectTag {
    /// Immutable byte string.
    String,
    /// Ordered sequence of values.
    Array,
    /// Boxed function id.
    Function,
    /// Function id plus captured up-value cells.
    Closure,
    /// Refcounted cell holding one value, shared between closures.
    Upvalue,
}

impl ObjectTag {
    /// Whether objects of this type are routed through the cycle collector
    /// on their final release. Strings, numbers and functions can never
    /// close a cycle, which biases the common case to immediate
    /// reclamation.
    pub const fn is_cyclic(&self) -> bool {
        matches!(self, Self::Array | Self::Closure)
    }
}

/// Header carried by every heap object: type tag, reference count, flag
/// bits, accounted body size and a stable object id.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    tag: ObjectTag,
    flags: HeaderFlags,
    refs: u32,
    size: usize,
    id: u64,
}

impl Header {
    /// A fresh header with a reference count of one.
    pub fn new(tag: ObjectTag, size: usize, id: u64) -> Self {
        let flags = if tag.is_cyclic() {
            HeaderFlags::CYCLIC
        } else {
            HeaderFlags::empty()
        };

        Self {
            tag,
            flags,
            refs: 1,
            size,
            id,
        }
    }

    /// Object type tag.
    pub const fn tag(&self) -> ObjectTag {
        self.tag
    }

    /// Current reference count.
    pub const fn refs(&self) -> u32 {
        self.refs
    }

    /// Accounted body size, in bytes, excluding the fixed header charge.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Stable object id, unique over the life of the heap.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Whether the final release defers to the cycle collector.
    pub const fn is_cyclic(&self) -> bool {
        self.flags.contains(HeaderFlags::CYCLIC)
    }

    /// Reachability color of the running collection pass.
    pub const fn is_marked(&self) -> bool {
        self.flags.contains(HeaderFlags::MARK)
    }

    pub(crate) fn set_mark(&mut self) {
        self.flags.insert(HeaderFlags::MARK);
    }

    pub(crate) fn clear_mark(&mut self) {
        self.flags.remove(HeaderFlags::MARK);
    }

    pub(crate) fn inc_ref(&mut self) {
        self.refs += 1;
    }

    pub(crate) fn dec_ref(&mut self) -> u32 {
        debug_assert!(self.refs > 0, "release of dead object {}", self.id);
        self.refs -= 1;
        self.refs
    }
}
