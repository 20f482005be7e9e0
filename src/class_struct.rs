use crate::{error::SlotError, trampoline::NativeCallable};
use std::{
    collections::BTreeMap,
    ffi::c_void,
    fmt::{Debug, Formatter},
    mem::{align_of, size_of},
    ptr::NonNull,
};

const SLOT_SIZE: usize = size_of::<usize>();
const SLOT_ALIGN: usize = align_of::<usize>();

/// A type's class structure: a block of memory whose pointer-sized slots hold
/// virtual-function entry points.
///
/// Slot writes are bounds- and alignment-checked. Every trampoline installed
/// through [`ClassStruct::install`] is owned here and freed when it is replaced
/// or when the class structure is dropped.
pub struct ClassStruct {
    base: NonNull<u8>,
    size: usize,
    // keeps owned memory alive, `None` for borrowed class structures
    _storage: Option<Box<[usize]>>,
    trampolines: BTreeMap<usize, Box<dyn NativeCallable>>,
}

impl Debug for ClassStruct {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ClassStruct({:p}, {} bytes, {} trampolines)",
            self.base,
            self.size,
            self.trampolines.len()
        )
    }
}

impl ClassStruct {
    /// Allocates `size` zeroed, pointer-aligned bytes.
    pub fn new(size: usize) -> Self {
        let words = size.div_ceil(SLOT_SIZE).max(1);
        let mut storage = vec![0usize; words].into_boxed_slice();
        let base = NonNull::from(&mut *storage).cast::<u8>();
        Self {
            base,
            size,
            _storage: Some(storage),
            trampolines: BTreeMap::new(),
        }
    }

    /// Wraps an externally allocated class structure.
    ///
    /// # Safety
    /// `base` must be valid for reads and writes of `size` bytes for the lifetime
    /// of the returned value, and nothing else may access it meanwhile.
    pub unsafe fn from_raw(base: NonNull<u8>, size: usize) -> Result<Self, SlotError> {
        if base.as_ptr() as usize % SLOT_ALIGN != 0 {
            return Err(SlotError::MisalignedBase(base.as_ptr() as usize));
        }
        Ok(Self {
            base,
            size,
            _storage: None,
            trampolines: BTreeMap::new(),
        })
    }

    pub fn as_ptr(&self) -> *const c_void {
        self.base.as_ptr() as *const c_void
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn check_slot(&self, offset: usize) -> Result<*mut *mut c_void, SlotError> {
        match offset.checked_add(SLOT_SIZE) {
            Some(end) if end <= self.size => {}
            _ => {
                return Err(SlotError::OutOfBounds {
                    offset,
                    size: self.size,
                })
            }
        }
        if offset % SLOT_ALIGN != 0 {
            return Err(SlotError::Misaligned {
                offset,
                align: SLOT_ALIGN,
            });
        }
        // SAFETY: in bounds per the check above
        Ok(unsafe { self.base.as_ptr().add(offset) } as *mut *mut c_void)
    }

    pub fn read_pointer(&self, offset: usize) -> Result<*mut c_void, SlotError> {
        let slot = self.check_slot(offset)?;
        // SAFETY: in bounds and aligned, and the memory is ours for our lifetime
        Ok(unsafe { slot.read() })
    }

    pub fn write_pointer(&mut self, offset: usize, value: *mut c_void) -> Result<(), SlotError> {
        let slot = self.check_slot(offset)?;
        // SAFETY: see read_pointer
        unsafe { slot.write(value) };
        Ok(())
    }

    /// Writes the trampoline's entry point at `offset` and takes ownership of it.
    /// Returns the trampoline previously installed in that slot, which the
    /// caller may drop once nothing can still be executing it.
    pub fn install(
        &mut self,
        offset: usize,
        trampoline: Box<dyn NativeCallable>,
    ) -> Result<Option<Box<dyn NativeCallable>>, SlotError> {
        self.write_pointer(offset, trampoline.entry_point().as_ptr())?;
        Ok(self.trampolines.insert(offset, trampoline))
    }

    pub fn trampoline_at(&self, offset: usize) -> Option<&dyn NativeCallable> {
        self.trampolines.get(&offset).map(|t| t.as_ref())
    }

    /// Installed trampolines by slot offset, ascending.
    pub fn installed(&self) -> impl Iterator<Item = (usize, &(dyn NativeCallable + 'static))> + '_ {
        self.trampolines.iter().map(|(o, t)| (*o, t.as_ref()))
    }

    pub fn n_installed(&self) -> usize {
        self.trampolines.len()
    }
}
