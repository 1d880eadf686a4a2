// Build script to compile GLSL shaders to SPIR-V

use std::path::Path;
use std::process::Command;

const SHADERS: &[(&str, &str)] = &[
    ("shaders/model.vert", "shaders/model.vert.spv"),
    ("shaders/model.frag", "shaders/model.frag.spv"),
];

fn main() {
    println!("cargo:rerun-if-changed=shaders/model.vert");
    println!("cargo:rerun-if-changed=shaders/model.frag");

    for (input, output) in SHADERS {
        compile_shader(input, output);
    }
}

fn compile_shader(input: &str, output: &str) {
    // Check if glslc is available
    let result = Command::new("glslc")
        .arg(Path::new(input))
        .arg("-o")
        .arg(Path::new(output))
        .status();

    match result {
        Ok(status) if status.success() => {}
        Ok(status) => {
            panic!("Failed to compile {}: exit code {:?}", input, status.code());
        }
        Err(e) => {
            // Shaders are read at runtime, so a missing compiler only matters
            // if the .spv files were never produced.
            println!("cargo:warning=glslc not found ({}), skipping {}", e, input);
            println!("cargo:warning=compile manually: glslc {} -o {}", input, output);
        }
    }
}
