use std::{cell::RefCell, ffi::c_void, rc::Rc};
use vfunc_rs::{
    class_struct::ClassStruct,
    error::{BindingError, SlotError, TrampolineError},
    host::{HostRuntime, MethodTable},
    trampoline::{FfiTrampolineFactory, NativeCallable, TrampolineFactory},
    tracer::{TraceLevel, Tracer},
    types::{CallbackSignature, FieldInfo, ObjectInfo, Scalar, StructInfo, TypeInfo, VFuncInfo},
    value::HostValue,
    vtable::{install_virtual_functions, install_virtual_functions_or_abort},
};

const CLASS_SIZE: usize = 32;

fn callback(args: &[Scalar], returns: Scalar) -> TypeInfo {
    TypeInfo::from(CallbackSignature::new(args.iter().copied(), returns))
}

fn foo_class() -> StructInfo {
    StructInfo::new(
        "FooClass",
        [
            FieldInfo::new("g_type", 0, TypeInfo::from(Scalar::Pointer)),
            FieldInfo::new("flags", 8, TypeInfo::from(Scalar::U32)),
            FieldInfo::new(
                "do_thing",
                16,
                callback(&[Scalar::Pointer, Scalar::I32], Scalar::I32),
            ),
            FieldInfo::new("do_other", 24, callback(&[Scalar::Pointer], Scalar::Void)),
        ],
        CLASS_SIZE,
        8,
    )
}

fn foo(vfuncs: &[&str]) -> ObjectInfo {
    ObjectInfo::new(
        "Foo",
        vfuncs.iter().map(|v| VFuncInfo::new(*v)),
        Some(foo_class()),
    )
}

type CallLog = Rc<RefCell<Vec<(String, Vec<HostValue>)>>>;

struct Fixture {
    runtime: Rc<MethodTable>,
    calls: CallLog,
    factory: FfiTrampolineFactory,
    tracer: Rc<Tracer>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_tracer(Tracer::disabled())
    }

    fn with_tracer(tracer: Tracer) -> Self {
        let calls: CallLog = Rc::default();
        let (thing, other) = (calls.clone(), calls.clone());
        let runtime = Rc::new(
            MethodTable::new()
                .with_method("DO_THING", move |args| {
                    thing.borrow_mut().push(("DO_THING".into(), args.to_vec()));
                    match args {
                        [_, HostValue::Int32(i)] => Ok(HostValue::Int32(i + 1)),
                        _ => Ok(HostValue::Int32(-1)),
                    }
                })
                .with_method("DO_OTHER", move |args| {
                    other.borrow_mut().push(("DO_OTHER".into(), args.to_vec()));
                    Ok(HostValue::Void)
                }),
        );
        let tracer = Rc::new(tracer);
        let factory = FfiTrampolineFactory::new(
            runtime.clone() as Rc<dyn HostRuntime>,
            tracer.clone(),
        );
        Self {
            runtime,
            calls,
            factory,
            tracer,
        }
    }

    fn install(
        &self,
        info: &ObjectInfo,
        class: &mut ClassStruct,
    ) -> Result<usize, BindingError> {
        install_virtual_functions(info, class, &self.factory, &self.tracer)
    }

    /// Trampolines currently alive, each holding one reference to the runtime.
    fn live_trampolines(&self) -> usize {
        Rc::strong_count(&self.runtime) - 2
    }
}

#[test]
fn patches_one_slot_per_vfunc() {
    let fixture = Fixture::new();
    let mut class = ClassStruct::new(CLASS_SIZE);

    let n = fixture
        .install(&foo(&["do_thing", "do_other"]), &mut class)
        .unwrap();
    assert_eq!(n, 2);

    let do_thing = class.read_pointer(16).unwrap();
    let do_other = class.read_pointer(24).unwrap();
    assert!(!do_thing.is_null());
    assert!(!do_other.is_null());
    assert_ne!(do_thing, do_other);
    assert!(class.read_pointer(0).unwrap().is_null());
    assert!(class.read_pointer(8).unwrap().is_null());

    assert_eq!(class.n_installed(), 2);
    let thing = class.trampoline_at(16).unwrap();
    assert_eq!(thing.method_name(), "DO_THING");
    assert_eq!(thing.entry_point().as_ptr(), do_thing);
    assert_eq!(class.trampoline_at(24).unwrap().method_name(), "DO_OTHER");
    assert_eq!(fixture.live_trampolines(), 2);
}

#[test]
fn installed_slots_dispatch_to_host_methods() {
    let fixture = Fixture::new();
    let mut class = ClassStruct::new(CLASS_SIZE);
    fixture
        .install(&foo(&["do_thing", "do_other"]), &mut class)
        .unwrap();

    let do_thing: unsafe extern "C" fn(*mut c_void, i32) -> i32 =
        unsafe { std::mem::transmute(class.read_pointer(16).unwrap()) };
    let do_other: unsafe extern "C" fn(*mut c_void) =
        unsafe { std::mem::transmute(class.read_pointer(24).unwrap()) };

    let instance = 0xdead0 as *mut c_void;
    assert_eq!(unsafe { do_thing(instance, 41) }, 42);
    unsafe { do_other(instance) };

    assert_eq!(
        *fixture.calls.borrow(),
        vec![
            (
                "DO_THING".to_string(),
                vec![HostValue::Pointer(instance), HostValue::Int32(41)]
            ),
            ("DO_OTHER".to_string(), vec![HostValue::Pointer(instance)]),
        ]
    );
}

#[test]
fn trace_reports_field_and_metadata_offsets() {
    let (tracer, buffer) = Tracer::capture(TraceLevel::Debug);
    let fixture = Fixture::with_tracer(tracer);
    let info = ObjectInfo::new(
        "Foo",
        [
            VFuncInfo::new("do_thing").with_reported_offset(0),
            VFuncInfo::new("do_other"),
        ],
        Some(foo_class()),
    );
    let mut class = ClassStruct::new(CLASS_SIZE);
    fixture.install(&info, &mut class).unwrap();

    let lines = buffer.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0]
        .starts_with("installing vfunc do_thing as DO_THING at offset 16 (vs. 0) inside 0x"));
    assert!(lines[1]
        .starts_with("installing vfunc do_other as DO_OTHER at offset 24 (vs. ?) inside 0x"));
    assert_eq!(fixture.tracer.stats().slots_installed, 2);
}

// A second pass is not idempotent: it builds fresh trampolines. The class
// structure frees the ones it replaces instead of leaking them.
#[test]
fn second_pass_replaces_trampolines() {
    let fixture = Fixture::new();
    let info = foo(&["do_thing", "do_other"]);
    let mut class = ClassStruct::new(CLASS_SIZE);

    fixture.install(&info, &mut class).unwrap();
    let first = (
        class.read_pointer(16).unwrap(),
        class.read_pointer(24).unwrap(),
    );
    let kept_alive = class.trampoline_at(16).unwrap().entry_point();
    assert_eq!(kept_alive.as_ptr(), first.0);

    fixture.install(&info, &mut class).unwrap();
    let second = (
        class.read_pointer(16).unwrap(),
        class.read_pointer(24).unwrap(),
    );

    assert_eq!(class.n_installed(), 2);
    assert_eq!(fixture.live_trampolines(), 2);
    assert!(!second.0.is_null() && !second.1.is_null());
    assert_eq!(
        class.trampoline_at(16).unwrap().entry_point().as_ptr(),
        second.0
    );
}

#[test]
fn missing_field_stops_the_pass() {
    let fixture = Fixture::new();
    let mut class = ClassStruct::new(CLASS_SIZE);

    let err = fixture
        .install(&foo(&["do_thing", "do_missing", "do_other"]), &mut class)
        .unwrap_err();
    assert_eq!(
        err,
        BindingError::MissingField {
            type_name: "Foo".into(),
            vfunc: "do_missing".into()
        }
    );
    assert_eq!(err.vfunc(), Some("do_missing"));

    // patched before the failure, untouched after it
    assert!(!class.read_pointer(16).unwrap().is_null());
    assert!(class.read_pointer(24).unwrap().is_null());
    assert_eq!(class.n_installed(), 1);
    assert_eq!(fixture.live_trampolines(), 1);
}

#[test]
fn repeated_vfunc_cannot_patch_a_slot_twice() {
    let (tracer, buffer) = Tracer::capture(TraceLevel::Debug);
    let fixture = Fixture::with_tracer(tracer);
    let mut class = ClassStruct::new(CLASS_SIZE);

    let err = fixture
        .install(&foo(&["do_thing", "do_other", "do_thing"]), &mut class)
        .unwrap_err();
    assert_eq!(
        err,
        BindingError::SlotAlreadyPatched {
            vfunc: "do_thing".into(),
            offset: 16
        }
    );
    assert_eq!(class.n_installed(), 2);
    assert_eq!(fixture.live_trampolines(), 2);
    assert_eq!(fixture.tracer.stats().slots_installed, 2);
    assert_eq!(buffer.lines().len(), 2);
}

#[test]
fn aliased_fields_cannot_patch_a_slot_twice() {
    let fixture = Fixture::new();
    let info = ObjectInfo::new(
        "Foo",
        [VFuncInfo::new("do_thing"), VFuncInfo::new("do_alias")],
        Some(StructInfo::new(
            "FooClass",
            [
                FieldInfo::new("do_thing", 16, callback(&[], Scalar::Void)),
                FieldInfo::new("do_alias", 16, callback(&[], Scalar::Void)),
            ],
            CLASS_SIZE,
            8,
        )),
    );
    let mut class = ClassStruct::new(CLASS_SIZE);

    assert_eq!(
        fixture.install(&info, &mut class),
        Err(BindingError::SlotAlreadyPatched {
            vfunc: "do_alias".into(),
            offset: 16
        })
    );
    assert_eq!(class.trampoline_at(16).unwrap().method_name(), "DO_THING");
    assert_eq!(fixture.live_trampolines(), 1);
}

#[test]
fn field_names_match_exactly() {
    let fixture = Fixture::new();
    let mut class = ClassStruct::new(CLASS_SIZE);
    let err = fixture.install(&foo(&["DO_THING"]), &mut class).unwrap_err();
    assert!(matches!(
        err,
        BindingError::MissingField { ref vfunc, .. } if vfunc == "DO_THING"
    ));
    assert_eq!(class.n_installed(), 0);
}

#[test]
fn zero_vfuncs_is_a_no_op() {
    let fixture = Fixture::new();
    let mut class = ClassStruct::new(CLASS_SIZE);
    assert_eq!(fixture.install(&foo(&[]), &mut class), Ok(0));
    for offset in (0..CLASS_SIZE).step_by(8) {
        assert!(class.read_pointer(offset).unwrap().is_null());
    }
    assert_eq!(class.n_installed(), 0);
}

#[test]
fn class_struct_metadata_is_required() {
    let fixture = Fixture::new();
    let mut class = ClassStruct::new(CLASS_SIZE);

    let bare = ObjectInfo::new("Bare", Vec::<VFuncInfo>::new(), None);
    assert_eq!(
        fixture.install(&bare, &mut class),
        Err(BindingError::MissingClassStruct("Bare".into()))
    );

    let with_vfuncs = ObjectInfo::new("Bare", [VFuncInfo::new("do_thing")], None);
    assert_eq!(
        fixture.install(&with_vfuncs, &mut class),
        Err(BindingError::MissingClassStruct("Bare".into()))
    );
    assert_eq!(class.n_installed(), 0);
}

#[test]
fn non_callback_field_is_rejected() {
    let fixture = Fixture::new();
    let mut class = ClassStruct::new(CLASS_SIZE);
    assert_eq!(
        fixture.install(&foo(&["flags"]), &mut class),
        Err(BindingError::NotACallback {
            type_name: "Foo".into(),
            vfunc: "flags".into(),
            actual: "u32".into()
        })
    );
}

#[test]
fn slot_outside_the_class_struct() {
    let fixture = Fixture::new();
    let info = ObjectInfo::new(
        "Foo",
        [VFuncInfo::new("do_thing")],
        Some(StructInfo::new(
            "FooClass",
            [FieldInfo::new(
                "do_thing",
                CLASS_SIZE,
                callback(&[], Scalar::Void),
            )],
            CLASS_SIZE,
            8,
        )),
    );
    let mut class = ClassStruct::new(CLASS_SIZE);
    assert_eq!(
        fixture.install(&info, &mut class),
        Err(BindingError::Slot {
            vfunc: "do_thing".into(),
            source: SlotError::OutOfBounds {
                offset: CLASS_SIZE,
                size: CLASS_SIZE
            }
        })
    );
    assert_eq!(class.n_installed(), 0);
    assert_eq!(fixture.live_trampolines(), 0);
}

struct FailingFactory;

impl TrampolineFactory for FailingFactory {
    fn create(
        &self,
        _signature: &CallbackSignature,
        _method: &str,
    ) -> Result<Box<dyn NativeCallable>, TrampolineError> {
        Err(TrampolineError::NullEntryPoint)
    }
}

#[test]
fn trampoline_failures_propagate() {
    let mut class = ClassStruct::new(CLASS_SIZE);
    let err = install_virtual_functions(
        &foo(&["do_thing"]),
        &mut class,
        &FailingFactory,
        &Tracer::disabled(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        BindingError::Trampoline {
            vfunc: "do_thing".into(),
            source: TrampolineError::NullEntryPoint
        }
    );
    assert!(class.read_pointer(16).unwrap().is_null());
}

#[test]
#[should_panic(expected = "do_missing")]
fn abort_names_the_offending_vfunc() {
    let fixture = Fixture::new();
    let mut class = ClassStruct::new(CLASS_SIZE);
    install_virtual_functions_or_abort(
        &foo(&["do_thing", "do_missing"]),
        &mut class,
        &fixture.factory,
        &fixture.tracer,
    );
}
