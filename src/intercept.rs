//! Declarative interception hooks.

/// Define functions that route through the thread's ledger.
///
/// Each generated function calls the given real implementation unless a test
/// has queued expectations for it from this module (or from a `tests` module
/// nested under it), in which case the call is dispatched to the queued
/// stand-in. Stand-ins receive the arguments as a tuple, `&mut (a, b, ..)`.
/// Argument and return types must be `'static`.
///
/// ```ignore
/// stub_ledger::intercept! {
///     pub fn unix_time() -> u64 = real::unix_time;
///     fn read_var(key: String) -> Option<String> = real::read_var;
/// }
/// ```
///
/// A call that breaks an expectation panics with the violation message.
#[macro_export]
macro_rules! intercept {
    ($(
        $(#[$meta:meta])*
        $vis:vis fn $name:ident ( $($arg:ident : $ty:ty),* $(,)? ) $(-> $ret:ty)? = $real:path ;
    )+) => {
        $(
            $(#[$meta])*
            #[track_caller]
            $vis fn $name($($arg: $ty),*) $(-> $ret)? {
                $crate::shared::intercepted_call(
                    ::std::module_path!(),
                    ::std::stringify!($name),
                    ($($arg,)*),
                    |($($arg,)*)| $real($($arg),*),
                )
            }
        )+
    };
}
