fn main() {
    // Plugins loaded by the harness resolve the host API (spank_option_register,
    // slurm_error, ...) against the executable's dynamic symbol table. Test
    // executables are linked the same way so their own symbols can be looked up.
    println!("cargo:rustc-link-arg=-Wl,--export-dynamic");
    println!("cargo:rerun-if-changed=build.rs");
}
