use alloc::string::String;
use alloc::sync::Arc;

use conquer_once::spin::OnceCell;
use futures_util::StreamExt;
use keyboard::ScancodeStream;
use parser::Parser;
use pc_keyboard::{DecodedKey, HandleControl, Keyboard, ScancodeSet1, layouts::Us104Key};
use vfscore::drivers::memfs::MemFs;
use vfscore::{Controller, FileType, OpenMode};

use crate::vfs_frame::KernelFrameAllocator;
use crate::vga::{self, Color, print, println};

pub mod keyboard;
pub mod parser;

static CONTROLLER: OnceCell<Controller> = OnceCell::uninit();

/// Boots the root mount the first time any command needs it: a `basic`
/// persistent root with an in-memory driver grafted on at `/` (§10.6).
/// A real boot sequence would instead scan for a GPT/FAT volume here and
/// mount it alongside, or in place of, the memfs.
pub(crate) fn controller() -> &'static Controller {
    CONTROLLER.get_or_init(|| {
        let controller = Controller::new(Arc::new(vfscore::drivers::basic::BasicDriver))
            .with_logger(Arc::new(|args| vga::with_color(Color::Red, || println!("kernel bug: {args}"))));
        controller
            .mount("/", Arc::new(MemFs::new(KernelFrameAllocator::new())))
            .expect("root mount must succeed exactly once at boot");
        controller
    })
}

const INPUT_BUFFER_LEN: usize = vga::BUFFER_WIDTH - get_prompt().len() - 1;
type InputBuffer = heapless::String<INPUT_BUFFER_LEN>;

pub async fn run() {
    let mut scancodes = ScancodeStream::new();
    let mut keyboard = Keyboard::new(ScancodeSet1::new(), Us104Key, HandleControl::Ignore);

    let mut history = heapless::Deque::<InputBuffer, 16>::new();

    let mut input_buffer = InputBuffer::new();
    let mut cursor_position = 0u8;

    vga::enable_cursor(13, 15);

    print_prompt();

    while let Some(scancode) = scancodes.next().await {
        if let Ok(Some(key_event)) = keyboard.add_byte(scancode) {
            if let Some(key) = keyboard.process_keyevent(key_event) {
                match key {
                    DecodedKey::Unicode(character) => {
                        // Handle enter
                        if character == '\n' {
                            println!();

                            if parse_and_execute(&input_buffer).await {
                                vga::disable_cursor();
                                return;
                            }

                            print_prompt();

                            // Pop the last item if the history is full and push this command into the queue
                            if history.is_full() {
                                history.pop_back();
                            }
                            history.push_front(input_buffer.clone()).unwrap();

                            input_buffer.clear();
                            cursor_position = 0;
                            continue;
                        }

                        // Handle backspace
                        if character == '\x08' {
                            if keyboard.get_modifiers().is_ctrl() {
                                input_buffer.clear();
                                cursor_position = 0;
                            } else {
                                input_buffer.pop();
                                cursor_position = cursor_position.saturating_sub(1);
                            }

                            let col = get_prompt().len() as u8 + cursor_position;

                            vga::set_column_position(col);
                            for _ in
                                (get_prompt().len() + cursor_position as usize)..vga::BUFFER_WIDTH
                            {
                                print!(" ");
                            }
                            vga::set_column_position(col);

                            vga::set_cursor_position(col, vga::BUFFER_HEIGHT as u8 - 1);

                            continue;
                        }

                        // Handle normal character
                        if input_buffer.push(character).is_ok() {
                            cursor_position += 1;
                            print!("{}", character);

                            let col = get_prompt().len() as u8 + cursor_position;

                            vga::set_cursor_position(col, vga::BUFFER_HEIGHT as u8 - 1);
                        }
                    }
                    DecodedKey::RawKey(_) => {}
                }
            }
        }
    }
}

const fn get_prompt() -> &'static str {
    "root@riptide> "
}

fn print_prompt() {
    let prompt = get_prompt();

    print!("{}", get_prompt());
    vga::set_cursor_position(prompt.len() as u8, vga::BUFFER_HEIGHT as u8 - 1);
}

/// Splits `/a/b/c` into (`"c"`, `"/a/b"`); the root itself has no parent.
fn split_parent(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some((&trimmed[1..], "/")),
        Some(i) => Some((&trimmed[i + 1..], &trimmed[..i])),
        None => Some((trimmed, "/")),
    }
}

fn format_entry(name: &str, kind: FileType, size: usize, long: bool) {
    if long {
        let tag = match kind {
            FileType::Directory => 'd',
            FileType::Regular => '-',
        };
        println!("{tag}rw-r--r-- {size:>8} {name}");
    } else {
        println!("{name}");
    }
}

async fn parse_and_execute(input: &str) -> bool {
    vga::with_color(Color::LightGray, || println!("input: {:?}", input));

    let mut args = heapless::Deque::<&str, 80>::new();

    for token in Parser::new(input) {
        args.push_back(token).ok();
    }

    vga::with_color(Color::LightGray, || println!("args: {:?}", args));

    loop {
        match args.pop_front() {
            Some("help") => {
                println!("TODO: insert a help message here")
            }
            Some("whoami") => {
                println!("root")
            }
            Some("echo" | "print") => {
                let len = args.len();

                for (i, arg) in args.iter().enumerate() {
                    print!("{arg}");

                    if i < len - 1 {
                        print!(" ");
                    }
                }

                println!();
            }
            Some("pwd") => {
                println!("/");
            }
            Some("uname") => {
                print!("Riptide");

                if let Some(&"-a") = args.front() {
                    print!(" riptide {} x86_64", env!("CARGO_PKG_VERSION"));
                }

                println!();
            }
            Some("ls") => {
                let path = args.front().cloned().unwrap_or("/"); // FIXME: use pwd
                let long = true; // FIXME: parse from args (-l)

                let handle = match controller().open(path, OpenMode::Read) {
                    Ok(h) => h,
                    Err(err) => {
                        println!("ls: {path}: {err}");
                        break;
                    }
                };

                let mut index = 0;
                loop {
                    match handle.readdir(index) {
                        Ok(entry) => {
                            format_entry(&entry.name, entry.kind, entry.size, long);
                            index += 1;
                        }
                        Err(vfscore::VfsError::IndexOutOfRange | vfscore::VfsError::EndOfFile) => break,
                        Err(vfscore::VfsError::NotDirectory) => {
                            format_entry(path, FileType::Regular, handle.get_size(), long);
                            break;
                        }
                        Err(err) => {
                            println!("ls: {path}: {err}");
                            break;
                        }
                    }
                }

                if let Err(err) = handle.close() {
                    println!("ls: {path}: {err}");
                }
            }
            Some("cat") => {
                let Some(path) = args.front() else {
                    println!("error: no path provided");
                    break;
                };

                let handle = match controller().open(path, OpenMode::Read) {
                    Ok(h) => h,
                    Err(err) => {
                        println!("cat: {path}: {err}");
                        break;
                    }
                };

                let mut offset = 0;
                let mut data = [0u8; 512];
                loop {
                    match handle.read(offset, &mut data) {
                        Ok(0) => break,
                        Ok(bytes) => {
                            print!("{}", String::from_utf8_lossy(&data[..bytes]));
                            offset += bytes;
                        }
                        Err(vfscore::VfsError::EndOfFile) => break,
                        Err(err) => {
                            println!("cat: {path}: {err}");
                            break;
                        }
                    }
                }
                println!();

                if let Err(err) = handle.close() {
                    println!("cat: {path}: {err}");
                }
            }
            Some("touch") => {
                let Some(path) = args.front() else {
                    println!("error: no path provided");
                    break;
                };

                match controller().open(path, OpenMode::Write) {
                    Ok(h) => {
                        if let Err(err) = h.close() {
                            println!("touch: {path}: {err}");
                        }
                    }
                    Err(err) => println!("touch: {path}: {err}"),
                }
            }
            Some("mkdir") => {
                let Some(path) = args.front() else {
                    println!("error: no path provided");
                    break;
                };

                let Some((name, parent_path)) = split_parent(path) else {
                    println!("mkdir: {path}: invalid path");
                    break;
                };

                let parent = match controller().open(parent_path, OpenMode::Write) {
                    Ok(h) => h,
                    Err(err) => {
                        println!("mkdir: {path}: {err}");
                        break;
                    }
                };

                if let Err(err) = parent.create(name, FileType::Directory) {
                    println!("mkdir: {path}: {err}");
                }
                if let Err(err) = parent.close() {
                    println!("mkdir: {path}: {err}");
                }
            }
            Some("rm") => {
                let Some(path) = args.front() else {
                    println!("error: no path provided");
                    break;
                };

                let Some((name, parent_path)) = split_parent(path) else {
                    println!("rm: {path}: invalid path");
                    break;
                };

                let parent = match controller().open(parent_path, OpenMode::Write) {
                    Ok(h) => h,
                    Err(err) => {
                        println!("rm: {path}: {err}");
                        break;
                    }
                };

                if let Err(err) = parent.remove(name) {
                    println!("rm: {path}: {err}");
                }
                if let Err(err) = parent.close() {
                    println!("rm: {path}: {err}");
                }
            }
            Some("mount") => {
                let Some(path) = args.front() else {
                    println!("error: usage: mount <path>");
                    break;
                };

                let driver: Arc<dyn vfscore::Driver> =
                    Arc::new(MemFs::new(KernelFrameAllocator::new()));

                match controller().mount(path, driver) {
                    Ok(()) => println!("mounted memfs at {path}"),
                    Err(err) => println!("mount: {path}: {err}"),
                }
            }
            Some("unmount" | "umount") => {
                let Some(path) = args.front() else {
                    println!("error: usage: unmount <path>");
                    break;
                };

                match controller().unmount(path) {
                    Ok(_driver) => println!("unmounted {path}"),
                    Err(err) => println!("unmount: {path}: {err}"),
                }
            }
            Some("realpath") => println!("error: not implemented yet"),
            Some("basename") => println!("error: not implemented yet"),
            Some("cd") => println!("error: not implemented yet"),
            Some("exit") => {
                return true;
            }
            // Unrecognized command
            Some(cmd) => {
                println!("command not found: {}", cmd)
            }
            // Got no actual input (just whitespace)
            None => {}
        }

        break;
    }

    false
}
