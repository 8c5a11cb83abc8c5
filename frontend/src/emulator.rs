use kc85_core::core::machine::Machine;
use sdl2::event::Event;
use sdl2::keyboard::Scancode;

use crate::input::KeyMap;
use crate::overlay;
use crate::video::Video;

pub fn run(machine: &mut dyn Machine, key_map: &KeyMap, scale: u32, show_fps: bool) {
    let sdl_context = sdl2::init().expect("Failed to initialize SDL2");
    let sdl_video = sdl_context.video().expect("Failed to init SDL video");

    let (width, height) = machine.display_size();
    let mut video = Video::new(&sdl_video, "KC85 Emulator", width, height, scale);
    let mut event_pump = sdl_context.event_pump().expect("Failed to get event pump");

    let buffer_size = (width * height * 3) as usize;
    let mut framebuffer = vec![0u8; buffer_size];

    let mut frame_count: u32 = 0;
    let mut fps_timer = std::time::Instant::now();
    let mut fps_text = String::from("--");
    let mut screenshot_requested = false;
    let mut screenshot_seq: u32 = 0;

    'main: loop {
        // Poll all pending SDL events, translate to machine input
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => break 'main,

                Event::KeyDown {
                    scancode: Some(Scancode::Escape),
                    ..
                } => break 'main,

                Event::KeyDown {
                    scancode: Some(Scancode::F12),
                    repeat: false,
                    ..
                } => screenshot_requested = true,

                Event::KeyDown {
                    scancode: Some(sc),
                    repeat: false,
                    ..
                } => {
                    if let Some(key_code) = key_map.get(sc) {
                        machine.set_input(key_code, true);
                    }
                }

                Event::KeyUp {
                    scancode: Some(sc), ..
                } => {
                    if let Some(key_code) = key_map.get(sc) {
                        machine.set_input(key_code, false);
                    }
                }

                _ => {}
            }
        }

        // Run one frame of emulation
        machine.run_frame();

        // Render the framebuffer and present
        machine.render_frame(&mut framebuffer);

        if screenshot_requested {
            screenshot_requested = false;
            screenshot_seq += 1;
            let path = std::path::PathBuf::from(format!("kc85-screenshot-{screenshot_seq:03}.png"));
            if let Err(e) = crate::video::save_screenshot(&framebuffer, width, height, &path) {
                eprintln!("Warning: failed to save screenshot: {e}");
            }
        }

        frame_count += 1;
        let elapsed = fps_timer.elapsed();
        if elapsed.as_secs_f32() >= 1.0 {
            fps_text = format!("{:.1}", frame_count as f32 / elapsed.as_secs_f32());
            frame_count = 0;
            fps_timer = std::time::Instant::now();
        }
        if show_fps {
            overlay::draw_fps(&mut framebuffer, width as usize, &fps_text);
        }

        video.present(&framebuffer);

        // Frame timing handled by VSync (set in Video::new via present_vsync)
    }
}
