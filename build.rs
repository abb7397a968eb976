//! Links the real `libotf` and `libotf2` C decoders via `pkg-config`.
//!
//! Neither library is vendored or stubbed here; if a target machine
//! lacks the `.pc` files this build simply fails, same as any other
//! crate wrapping a system library.

fn main() {
    if let Err(e) = pkg_config::Config::new().probe("otf") {
        println!("cargo:warning=libotf not found via pkg-config: {}", e);
    }
    if let Err(e) = pkg_config::Config::new().probe("otf2") {
        println!("cargo:warning=libotf2 not found via pkg-config: {}", e);
    }
}
