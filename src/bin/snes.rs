use anyhow::{anyhow, Context, Result};
use dirs::data_dir;
use log::{info, warn};
use sdl2::controller::Button;
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use snesticle_core::{config, Key, Snes};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const SCALE: u32 = 3;
const FRAME_TIME: Duration = Duration::from_micros(16_639);
const SAVE_INTERVAL: u64 = 3600;

fn main() -> Result<()> {
    env_logger::init();

    let rom_path = PathBuf::from(
        std::env::args()
            .nth(1)
            .context("Usage: --bin snes -- <path-to-rom>")?,
    );
    let rom = fs::read(&rom_path).context("Failed to read ROM file")?;
    let rom_name = rom_path
        .file_stem()
        .and_then(|s| s.to_str())
        .context("Failed to get the file name")?
        .to_string();

    let backup = load_save_data(&rom_name)?;
    let mut snes = Snes::new(rom, backup)?;

    let width = config::SCREEN_WIDTH as u32;
    let height = config::VISIBLE_LINES as u32;

    let sdl2_context = sdl2::init()
        .map_err(|e| anyhow!(e))
        .context("Failed to initialize SDL2")?;
    let video_subsystem = sdl2_context
        .video()
        .map_err(|e| anyhow!(e))
        .context("Failed to initialize SDL2 video subsystem")?;
    let window = video_subsystem
        .window("snesticle", width * SCALE, height * SCALE)
        .position_centered()
        .resizable()
        .build()
        .context("Failed to create window")?;
    let mut canvas = window
        .into_canvas()
        .present_vsync()
        .build()
        .context("Failed to create canvas")?;
    canvas
        .set_logical_size(width, height)
        .context("Failed to set logical size")?;
    let texture_creator = canvas.texture_creator();
    let mut texture = texture_creator
        .create_texture_streaming(PixelFormatEnum::RGB24, width, height)
        .context("Failed to create texture")?;

    let audio_subsystem = sdl2_context
        .audio()
        .map_err(|e| anyhow!(e))
        .context("Failed to initialize SDL2 audio subsystem")?;
    let desired_spec = sdl2::audio::AudioSpecDesired {
        freq: Some(config::SAMPLE_RATE as i32),
        channels: Some(2),
        samples: Some(1024),
    };
    let audio_queue = audio_subsystem
        .open_queue::<i16, _>(None, &desired_spec)
        .map_err(|e| anyhow!(e))
        .context("Failed to open audio queue")?;
    audio_queue
        .queue_audio(&[0i16; 1024])
        .map_err(|e| anyhow!(e))
        .context("Failed to queue audio")?;
    audio_queue.resume();

    let game_controller_subsystem = sdl2_context
        .game_controller()
        .map_err(|e| anyhow!(e))
        .context("Failed to initialize SDL2 game controller subsystem")?;
    let available = game_controller_subsystem
        .num_joysticks()
        .map_err(|e| anyhow!(e))
        .context("Failed to get the number of joysticks")?;
    // Kept alive for the button events
    let controller = (0..available)
        .find(|&id| game_controller_subsystem.is_game_controller(id))
        .map(|id| game_controller_subsystem.open(id))
        .transpose()
        .context("Failed to open game controller")?;
    if let Some(pad) = &controller {
        info!("Controller detected: {}", pad.name());
    }

    let mut event_pump = sdl2_context
        .event_pump()
        .map_err(|e| anyhow!(e))
        .context("Failed to get SDL2 event pump")?;

    let mut keys: Vec<Key> = Vec::new();
    let mut frame = 0u64;
    let mut pixels = vec![0u8; (width * height * 3) as usize];
    'running: loop {
        let start_time = Instant::now();
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => break 'running,
                Event::ControllerButtonDown { button, .. } => {
                    press(&mut keys, button_to_key(button), true)
                }
                Event::ControllerButtonUp { button, .. } => {
                    press(&mut keys, button_to_key(button), false)
                }
                Event::KeyDown {
                    keycode: Some(keycode),
                    ..
                } => press(&mut keys, keycode_to_key(keycode), true),
                Event::KeyUp {
                    keycode: Some(keycode),
                    ..
                } => press(&mut keys, keycode_to_key(keycode), false),
                _ => {}
            }
        }
        snes.set_keys(0, &keys);

        if !snes.exec_frame() {
            warn!("Stopped at breakpoint: {:?}", snes.cpu_registers());
            break 'running;
        }

        for (px, color) in pixels.chunks_exact_mut(3).zip(snes.frame_buffer()) {
            let expand = |c: u16| {
                let c = (c & 0x1F) as u8;
                c << 3 | c >> 2
            };
            px[0] = expand(*color);
            px[1] = expand(*color >> 5);
            px[2] = expand(*color >> 10);
        }
        texture
            .update(None, &pixels, (width * 3) as usize)
            .context("Failed to update texture")?;
        canvas.clear();
        canvas
            .copy(&texture, None, None)
            .map_err(|e| anyhow!(e))
            .context("Failed to copy texture")?;
        canvas.present();

        while audio_queue.size() > 1024 * 4 {
            std::thread::sleep(Duration::from_millis(1));
        }
        let samples: Vec<i16> = snes
            .audio_buffer()
            .iter()
            .flat_map(|s| [s.0, s.1])
            .collect();
        audio_queue
            .queue_audio(&samples)
            .map_err(|e| anyhow!(e))
            .context("Failed to queue audio")?;

        let elapsed = start_time.elapsed();
        if elapsed < FRAME_TIME {
            std::thread::sleep(FRAME_TIME - elapsed);
        }

        frame += 1;
        if frame % SAVE_INTERVAL == 0 {
            if let Some(data) = snes.backup() {
                info!("Saving data ...");
                save_data(&rom_name, &data)?;
            }
        }
    }

    if let Some(data) = snes.backup() {
        save_data(&rom_name, &data)?;
    }
    Ok(())
}

fn press(keys: &mut Vec<Key>, key: Option<Key>, down: bool) {
    let Some(key) = key else {
        return;
    };
    keys.retain(|&k| k != key);
    if down {
        keys.push(key);
    }
}

fn button_to_key(button: Button) -> Option<Key> {
    Some(match button {
        Button::Y => Key::X,
        Button::B => Key::A,
        Button::A => Key::B,
        Button::X => Key::Y,
        Button::Start => Key::Start,
        Button::Back => Key::Select,
        Button::DPadUp => Key::Up,
        Button::DPadDown => Key::Down,
        Button::DPadLeft => Key::Left,
        Button::DPadRight => Key::Right,
        Button::LeftShoulder => Key::L,
        Button::RightShoulder => Key::R,
        _ => return None,
    })
}

fn keycode_to_key(keycode: Keycode) -> Option<Key> {
    Some(match keycode {
        Keycode::Up => Key::Up,
        Keycode::Down => Key::Down,
        Keycode::Left => Key::Left,
        Keycode::Right => Key::Right,
        Keycode::X => Key::A,
        Keycode::Z => Key::B,
        Keycode::S => Key::X,
        Keycode::A => Key::Y,
        Keycode::Q => Key::L,
        Keycode::W => Key::R,
        Keycode::Return => Key::Start,
        Keycode::LShift => Key::Select,
        _ => return None,
    })
}

fn save_dir() -> Result<PathBuf> {
    let mut save_dir = data_dir().context("Failed to find the application data directory")?;
    save_dir.push("snesticle");
    Ok(save_dir)
}

fn save_data(rom_name: &str, sram_data: &[u8]) -> Result<()> {
    let save_dir = save_dir()?;
    if !save_dir.exists() {
        fs::create_dir_all(&save_dir)
            .with_context(|| format!("Failed to create directory: {:?}", save_dir))?;
    }
    let save_file = save_dir.join(format!("{}.srm", rom_name));
    fs::write(&save_file, sram_data)
        .with_context(|| format!("Failed to save data: {:?}", save_file))?;
    Ok(())
}

fn load_save_data(rom_name: &str) -> Result<Option<Vec<u8>>> {
    let save_file = save_dir()?.join(format!("{}.srm", rom_name));
    if save_file.exists() {
        let data = fs::read(&save_file)
            .with_context(|| format!("Failed to load save data: {:?}", save_file))?;
        Ok(Some(data))
    } else {
        Ok(None)
    }
}
