use clap::{Arg, Command};

use omapboot::{boot, probe, render_asic_id};

fn main() {
    env_logger::init();

    let matches = Command::new("omapboot")
        .about("Probe and boot the omap44xx ROM bootloader over a raw USB device node")
        .disable_version_flag(true)
        .arg(
            Arg::new("device")
                .short('d')
                .long("device")
                .help("Path to the raw USB device node")
                .use_value_delimiter(false)
                .default_value("/dev/ugen0.01"),
        )
        .subcommand(Command::new("id").about("Request the ASIC ID and hex-dump the response"))
        .subcommand(
            Command::new("boot")
                .about("Upload the second and third stage bootloaders")
                .arg(
                    Arg::new("second-stage")
                        .help("Second stage image (x-loader)")
                        .required(true),
                )
                .arg(
                    Arg::new("third-stage")
                        .help("Third stage image (e.g. U-Boot)")
                        .required(true),
                ),
        )
        .get_matches();

    let device = matches.value_of("device").unwrap();

    let result = match matches.subcommand() {
        Some(("boot", sub)) => boot(
            device,
            sub.value_of("second-stage").unwrap(),
            sub.value_of("third-stage").unwrap(),
        ),
        _ => probe(device).map(|id| print!("{}", render_asic_id(&id))),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }
}
