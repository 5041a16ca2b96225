//! Demangling cascade, trimmed to the toolchains that actually appear on
//! this engine's target platforms (Linux ELF and Android NDK/ART): Rust and
//! Itanium C++. This engine never sees Windows PDBs or OCaml/Scala-native
//! binaries, so those branches have no caller here.

const LINKER_PREFIX: &str = "$";

/// Attempt to demangle `name`, trying Rust first, then Itanium C++, and
/// falling back to the input unchanged.
pub fn demangle_any(name: &str) -> String {
    if let Ok(demangled_symbol) = rustc_demangle::try_demangle(name) {
        return format!("{demangled_symbol:#}");
    }

    if name.starts_with('_') {
        let options = cpp_demangle::DemangleOptions::default().no_return_type();
        if let Ok(symbol) = cpp_demangle::Symbol::new(name) {
            if let Ok(demangled_string) = symbol.demangle_with_options(&options) {
                return demangled_string;
            }
        }
    }

    name.to_owned()
}

/// Demangles a name that may carry a linker prefix token (the literal `$`
/// used by Android's bionic linker and some NDK toolchains to tag ifunc
/// resolver trampolines and linker-local aliases). The prefix is stripped
/// before demangling and `"[linker]"` is re-prepended to the result.
/// Demangling failures return the input unchanged, prefix restored.
pub fn demangle(name: &str) -> String {
    match name.strip_prefix(LINKER_PREFIX) {
        Some(rest) => format!("[linker]{}", demangle_any(rest)),
        None => demangle_any(name),
    }
}
