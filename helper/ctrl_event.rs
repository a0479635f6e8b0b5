//! Console control event helper.
//!
//! Usage: `ctrl_event PID... EVENT`
//!
//! Attaches to the console of the first PID it can and raises EVENT (0 for Ctrl+C, 1
//! for Ctrl+Break) there. Exits with 0 if the event was generated and 1 otherwise.

use std::env;
use std::process::exit;

type Bool = i32;
type Dword = u32;
type HandlerRoutine = Option<unsafe extern "system" fn(Dword) -> Bool>;

#[link(name = "kernel32")]
unsafe extern "system" {
    fn FreeConsole() -> Bool;
    fn AttachConsole(process_id: Dword) -> Bool;
    fn SetConsoleCtrlHandler(handler: HandlerRoutine, add: Bool) -> Bool;
    fn GenerateConsoleCtrlEvent(ctrl_event: Dword, process_group_id: Dword) -> Bool;
}

// The event is broadcast to the whole console, which now includes this process.
unsafe extern "system" fn swallow(_event: Dword) -> Bool {
    1
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some((event, pids)) = args.split_last() else {
        exit(1);
    };
    let Ok(event) = event.parse::<Dword>() else {
        exit(1);
    };

    unsafe {
        SetConsoleCtrlHandler(Some(swallow), 1);
        for pid in pids {
            let Ok(pid) = pid.parse::<Dword>() else {
                continue;
            };
            FreeConsole();
            if AttachConsole(pid) != 0 {
                let ok = GenerateConsoleCtrlEvent(event, 0) != 0;
                exit(if ok { 0 } else { 1 });
            }
        }
    }
    exit(1);
}
