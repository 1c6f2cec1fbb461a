//! CLI entry point for the calculator peripheral driver.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use calc_core::{calculate, CalcConfig, CalcError, Opcode, PollBudget, Request};
use log::LevelFilter;
#[cfg(test)]
use tempfile as _;

mod logger;

const USAGE_TEXT: &str = "\
Usage: calc [options] <a> <op> <b>

  a, b   unsigned 32-bit integers (decimal, 0x hex, or 0 octal)
  op     one of: + - * /

Options:
  --device <path>     Physical memory device (default: /dev/mem)
  --base <addr>       Register block base address (default: 0xFE000000)
  --budget <n>        Give up after n status polls (default: 1000000)
  --timeout-ms <ms>   Give up after ms milliseconds instead of a poll count
  -v, --verbose       Log mapping and polling details to stderr
  -h, --help          Show this help message

Examples:
  calc 10 + 5
  calc 10 - 3
  calc 10 '*' 5
  calc 10 / 2
";

#[derive(Debug, PartialEq, Eq)]
struct CalcArgs {
    request: Request,
    config: CalcConfig,
    verbose: bool,
}

#[derive(Debug)]
enum ParseResult {
    Run(CalcArgs),
    Help,
}

#[allow(clippy::while_let_on_iterator)]
fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut config = CalcConfig::default();
    let mut verbose = false;
    let mut budget: Option<PollBudget> = None;
    let mut positionals: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        let arg = arg.to_string_lossy().to_string();

        match arg.as_str() {
            "-h" | "--help" => return Ok(ParseResult::Help),
            "-v" | "--verbose" => verbose = true,
            "--device" => {
                let value = next_value(&mut args, "--device")?;
                config.device_path = PathBuf::from(value);
            }
            "--base" => {
                let value = next_value(&mut args, "--base")?;
                config.window.base = parse_u64(&value)
                    .ok_or_else(|| format!("invalid base address '{value}'"))?;
            }
            "--budget" => {
                let value = next_value(&mut args, "--budget")?;
                let count = parse_u32(&value)
                    .ok_or_else(|| format!("invalid poll budget '{value}'"))?;
                set_budget(&mut budget, PollBudget::Iterations(count))?;
            }
            "--timeout-ms" => {
                let value = next_value(&mut args, "--timeout-ms")?;
                let millis =
                    parse_u64(&value).ok_or_else(|| format!("invalid timeout '{value}'"))?;
                set_budget(&mut budget, PollBudget::Deadline(Duration::from_millis(millis)))?;
            }
            option if option.len() > 1 && option.starts_with('-') => {
                return Err(format!("unknown option: {option}"));
            }
            _ => positionals.push(arg),
        }
    }

    let [a, op, b] = <[String; 3]>::try_from(positionals)
        .map_err(|_| "expected 3 arguments".to_string())?;

    let operand_a = parse_u32(&a).ok_or_else(|| format!("invalid operand '{a}'"))?;
    let operand_b = parse_u32(&b).ok_or_else(|| format!("invalid operand '{b}'"))?;
    let opcode = Opcode::from_symbol(&op).map_err(|e| e.to_string())?;

    if let Some(budget) = budget {
        config.budget = budget;
    }

    Ok(ParseResult::Run(CalcArgs {
        request: Request::new(operand_a, opcode, operand_b),
        config,
        verbose,
    }))
}

fn next_value(args: &mut impl Iterator<Item = OsString>, option: &str) -> Result<String, String> {
    args.next()
        .map(|value| value.to_string_lossy().to_string())
        .ok_or_else(|| format!("missing value for {option}"))
}

fn set_budget(slot: &mut Option<PollBudget>, budget: PollBudget) -> Result<(), String> {
    if slot.is_some() {
        return Err("--budget and --timeout-ms are mutually exclusive".to_string());
    }
    *slot = Some(budget);
    Ok(())
}

/// Parses an unsigned integer with C `strtoul(.., 0)` radix rules.
fn parse_u64(text: &str) -> Option<u64> {
    let (digits, radix) = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };

    if digits.is_empty() || digits.starts_with('+') {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

fn parse_u32(text: &str) -> Option<u32> {
    parse_u64(text).and_then(|value| u32::try_from(value).ok())
}

fn run(args: CalcArgs) -> Result<(), i32> {
    if let Err(e) = args.config.validate() {
        eprintln!("error: {e}");
        return Err(1);
    }

    match calculate(&args.config, args.request) {
        Ok(result) => {
            println!("Result: {result}");
            Ok(())
        }
        Err(e @ CalcError::Timeout { .. }) => {
            eprintln!("{e}");
            Err(1)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Err(1)
        }
    }
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Run(args)) => {
            let level = if args.verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Warn
            };
            if let Err(e) = logger::init(level) {
                eprintln!("warning: {e}");
            }
            match run(args) {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!();
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}
