/// Opens a profiled scope covering the remainder of the surrounding block.
///
/// ```
/// fn process(items: &[u8]) {
///     tickscope_core::scope!("process");
///     tickscope_core::scope_metadata!("items", items.len());
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! scope {
    ($tag:expr) => {
        let _tickscope_guard = $crate::scope::ScopeGuard::enter($tag);
    };
}

/// Attaches one typed metadata entry to the innermost open scope on the
/// current thread. A no-op when no scope is open.
#[macro_export]
macro_rules! scope_metadata {
    ($key:expr, $value:expr) => {
        $crate::scope::attach($key, $value)
    };
}

/// Opens a profiled scope tagged with the enclosing function's name.
#[macro_export]
macro_rules! function_scope {
    () => {
        let _tickscope_guard = $crate::scope::ScopeGuard::enter($crate::__function_name!());
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __function_name {
    () => {{
        fn __tickscope_anchor() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::core::any::type_name::<T>()
        }
        let full = type_name_of(__tickscope_anchor);
        let full = full.strip_suffix("::__tickscope_anchor").unwrap_or(full);
        full.rsplit("::")
            .find(|segment| *segment != "{{closure}}")
            .unwrap_or(full)
    }};
}
