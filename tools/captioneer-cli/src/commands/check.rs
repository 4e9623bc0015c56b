//! Check system capabilities.

use captioneer_render_engine::ffmpeg::command_exists;

pub fn run() -> anyhow::Result<()> {
    println!("Captioneer System Check");
    println!("{}", "=".repeat(50));

    let mut ready = true;
    for (binary, purpose) in [("ffmpeg", "encoding"), ("ffprobe", "media probing")] {
        if command_exists(binary) {
            println!("[OK] {binary} ({purpose})");
        } else {
            println!("[MISSING] {binary} ({purpose}): install FFmpeg and make sure it is on PATH");
            ready = false;
        }
    }

    println!();
    if ready {
        println!("All required tools are available. Captioneer is ready.");
    } else {
        println!("Some required tools are missing. See above for fixes.");
    }

    Ok(())
}
