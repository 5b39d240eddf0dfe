fn main() {
    // Npcap SDK libraries are only needed on Windows; look for them in lib/
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("windows") {
        println!("cargo:rustc-link-search=native=lib");
        println!("cargo:rustc-link-lib=wpcap");
        println!("cargo:rustc-link-lib=Packet");
    }

    // Rerun build script if any files in lib change
    println!("cargo:rerun-if-changed=lib");
}
