//! The exported symbols, driven the way a C host would drive them.

use std::ffi::CStr;
use std::mem::MaybeUninit;
use std::ptr;

use arrow::array::{Array, Int32Array};
use arrow::ffi::{from_ffi, FFI_ArrowArray, FFI_ArrowSchema};
use arrow_exporter::{
    export_int32_data, handoff_clear_error, handoff_export_int32, handoff_export_int32_random,
    handoff_export_int32_sequence, handoff_last_error, handoff_last_error_code,
    DEFAULT_EXPORT_LEN, HANDOFF_ERR_ALLOCATION, HANDOFF_ERR_CONTRACT, HANDOFF_ERR_NULL_POINTER,
    HANDOFF_OK,
};
use handoff_core::{
    import_array, import_array_with_schema, ArrowArray, ArrowSchema, DescriptorState,
    HandoffError,
};

#[test]
fn test_demo_symbol_imports() {
    let mut slot = ArrowArray::empty();
    // SAFETY: `slot` is a valid writable descriptor.
    unsafe { export_int32_data(&mut slot) };

    let imported = import_array::<i32>(&mut slot).unwrap();
    assert_eq!(imported.len(), DEFAULT_EXPORT_LEN);
    assert_eq!(imported.null_count(), 0);
    assert_eq!(slot.state(), DescriptorState::Released);
}

#[test]
fn test_demo_symbol_manual_release() {
    let mut slot = MaybeUninit::<ArrowArray>::uninit();
    // SAFETY: writable, uninitialized memory is allowed.
    unsafe { export_int32_data(slot.as_mut_ptr()) };
    // SAFETY: the exporter always writes the slot.
    let mut array = unsafe { slot.assume_init() };

    let release = array.release.unwrap();
    // SAFETY: release as a C consumer would, twice.
    unsafe {
        release(&mut array);
        release(&mut array);
    }
    assert!(array.is_released());
    assert!(matches!(
        import_array::<i32>(&mut array),
        Err(HandoffError::AlreadyReleased)
    ));
}

#[test]
fn test_sequence_with_schema_pairing() {
    let mut array = ArrowArray::empty();
    let mut schema = ArrowSchema::empty();
    // SAFETY: both slots are valid.
    let rc = unsafe { handoff_export_int32_sequence(1, 4, &mut array, &mut schema) };
    assert_eq!(rc, HANDOFF_OK);

    let imported = import_array_with_schema::<i32>(&mut array, &mut schema).unwrap();
    assert_eq!(imported.values(), &[1, 2, 3, 4]);
}

#[test]
fn test_schema_rejects_wrong_type() {
    let mut array = ArrowArray::empty();
    let mut schema = ArrowSchema::empty();
    // SAFETY: both slots are valid.
    let rc = unsafe { handoff_export_int32_random(7, 16, &mut array, &mut schema) };
    assert_eq!(rc, HANDOFF_OK);

    let err = import_array_with_schema::<u32>(&mut array, &mut schema).unwrap_err();
    assert!(matches!(err, HandoffError::ContractViolation(_)));
    assert_eq!(array.state(), DescriptorState::Populated);
}

#[test]
fn test_random_is_reproducible() {
    let export = |seed| {
        let mut slot = ArrowArray::empty();
        // SAFETY: valid slot, schema not requested.
        let rc = unsafe { handoff_export_int32_random(seed, 32, &mut slot, ptr::null_mut()) };
        assert_eq!(rc, HANDOFF_OK);
        import_array::<i32>(&mut slot).unwrap().values().to_vec()
    };
    assert_eq!(export(11), export(11));
}

#[test]
fn test_arrow_reads_array_and_schema() {
    let values = [3i32, 0, 5, 8];
    let validity = [1u8, 0, 1, 1];
    let mut array = ArrowArray::empty();
    let mut schema = ArrowSchema::empty();
    // SAFETY: four values and flags; slots are valid.
    let rc = unsafe {
        handoff_export_int32(values.as_ptr(), validity.as_ptr(), 4, &mut array, &mut schema)
    };
    assert_eq!(rc, HANDOFF_OK);

    let array = std::mem::take(&mut array);
    let schema = std::mem::take(&mut schema);
    // SAFETY: both structs have the C Data Interface layout.
    let (ffi_array, ffi_schema): (FFI_ArrowArray, FFI_ArrowSchema) =
        unsafe { (std::mem::transmute(array), std::mem::transmute(schema)) };
    assert!(ffi_schema.nullable());

    // SAFETY: populated array described by `ffi_schema`.
    let data = unsafe { from_ffi(ffi_array, &ffi_schema) }.unwrap();
    let array = Int32Array::from(data);
    assert_eq!(array.null_count(), 1);
    assert_eq!(array, Int32Array::from(vec![Some(3), None, Some(5), Some(8)]));
}

#[test]
fn test_null_slot_sets_last_error() {
    handoff_clear_error();
    // SAFETY: null is rejected before any write.
    let rc = unsafe { handoff_export_int32_sequence(0, 4, ptr::null_mut(), ptr::null_mut()) };
    assert_eq!(rc, HANDOFF_ERR_NULL_POINTER);
    assert_eq!(handoff_last_error_code(), HANDOFF_ERR_NULL_POINTER);

    // SAFETY: stored on this thread by the failed call.
    let message = unsafe { CStr::from_ptr(handoff_last_error()) };
    assert!(message.to_str().unwrap().contains("out_array"));

    // A later successful call clears it.
    let mut slot = ArrowArray::empty();
    // SAFETY: valid slot.
    assert_eq!(
        unsafe { handoff_export_int32_sequence(0, 1, &mut slot, ptr::null_mut()) },
        HANDOFF_OK
    );
    assert!(handoff_last_error().is_null());
}

#[test]
fn test_allocation_failure_leaves_slots_empty() {
    let mut array = ArrowArray::empty();
    let mut schema = ArrowSchema::empty();
    // SAFETY: both slots are valid; the allocation fails before any write
    // beyond resetting them.
    let rc = unsafe { handoff_export_int32_sequence(0, usize::MAX, &mut array, &mut schema) };

    assert_eq!(rc, HANDOFF_ERR_ALLOCATION);
    assert_eq!(handoff_last_error_code(), HANDOFF_ERR_ALLOCATION);
    assert_eq!(array.state(), DescriptorState::Unpopulated);
    assert!(array.release.is_none());
    assert!(schema.is_released());
    assert!(schema.is_unpopulated());

    // The slots stay usable.
    // SAFETY: both slots are valid.
    let rc = unsafe { handoff_export_int32_sequence(5, 2, &mut array, &mut schema) };
    assert_eq!(rc, HANDOFF_OK);
    let imported = import_array_with_schema::<i32>(&mut array, &mut schema).unwrap();
    assert_eq!(imported.values(), &[5, 6]);
}

#[test]
fn test_unaddressable_length_is_a_contract_violation() {
    let values = [1i32];
    let mut array = ArrowArray::empty();
    // SAFETY: the length is rejected before `values` is read.
    let rc = unsafe {
        handoff_export_int32(values.as_ptr(), ptr::null(), usize::MAX / 2, &mut array, ptr::null_mut())
    };

    assert_eq!(rc, HANDOFF_ERR_CONTRACT);
    assert_eq!(handoff_last_error_code(), HANDOFF_ERR_CONTRACT);
    // SAFETY: stored on this thread by the failed call.
    let message = unsafe { CStr::from_ptr(handoff_last_error()) };
    assert!(message.to_str().unwrap().contains("addressable"));
    assert_eq!(array.state(), DescriptorState::Unpopulated);
}
