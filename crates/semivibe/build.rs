fn main() {
    for (key, exported) in [
        ("TARGET", "SEMIVIBE_BUILD_TARGET"),
        ("PROFILE", "SEMIVIBE_BUILD_PROFILE"),
    ] {
        if let Ok(value) = std::env::var(key) {
            println!("cargo:rustc-env={exported}={value}");
        }
        println!("cargo:rerun-if-env-changed={key}");
    }
}
