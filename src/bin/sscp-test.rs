//! Self-test, then a single live pass against a reader: authenticate, pull
//! identification, poll once for a card, and transceive one APDU.

use anyhow::{Context, Result};
use clap::Parser;
use sscp_host::{SscpConfig, SscpContext};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "SSCP self-test + single live exchange")]
struct Args {
    /// Serial device to open for the live pass (e.g. /dev/ttyUSB0, COM8).
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Baudrate for the live pass.
    #[arg(long, default_value_t = 38400)]
    baudrate: u32,

    /// RS-485 address to select before authenticating.
    #[arg(long, default_value_t = 0x01)]
    address: u8,

    /// Skip the live pass and only run the self-test.
    #[arg(long, default_value_t = false)]
    self_test_only: bool,
}

fn show_statistics(ctx: &SscpContext) {
    let stats = ctx.get_statistics();
    println!("Total SSCP time:       {}s", stats.total_time_ms / 1000);
    println!("Recovered SSCP errors: {}", stats.total_errors);
    println!("Total bytes sent:      {}", stats.bytes_sent);
    println!("Total bytes received:  {}", stats.bytes_received);
    println!("Number of sessions:    {}", stats.session_count);
    println!("Last session time:     {}s", stats.session_time_ms / 1000);
    println!("Last session counter:  {}", stats.session_counter);
}

fn run_self_test() -> Result<()> {
    let mut ctx = SscpContext::new(SscpConfig::self_test());
    ctx.authenticate(None).context("self-test authenticate failed")?;
    ctx.outputs(0x02, 0x0A, 0x00).context("self-test Outputs failed")?;
    println!("SelfTest OK");
    Ok(())
}

fn run_live(args: &Args) -> Result<()> {
    let mut ctx = SscpContext::new(SscpConfig::default());
    ctx.open(&args.port, args.baudrate)
        .with_context(|| format!("failed to open {}", args.port))?;
    ctx.select_address(args.address).context("select_address failed")?;
    ctx.authenticate(None).context("authenticate failed")?;
    println!("Authenticate OK");

    let infos = ctx.get_infos().context("get_infos failed")?;
    println!(
        "GetInfos OK, version={:02X}, baudrate={:02X}, address={:02X}, voltage={:04X}",
        infos.version, infos.baudrate_selector, infos.address, infos.voltage_mv
    );

    let serial_number = ctx.get_serial_number().context("get_serial_number failed")?;
    println!("GetSerialNumber OK, serialNumber={serial_number}");

    let reader_type = ctx.get_reader_type().context("get_reader_type failed")?;
    println!("GetReaderType OK, readerType={reader_type}");

    ctx.output_rgb(0x2244FF, 0xFF, 0).ok();

    match ctx.scan_nfc().context("scan_nfc failed")? {
        sscp_host::ScanResult::None => {
            println!("ScanNFC: no card found");
        }
        sscp_host::ScanResult::IsoA { uid, ats, .. } => {
            println!("ScanNFC OK, card present, protocol=ISO-A");
            println!("\tUID={}", hex::encode_upper(&uid));
            if let Some(ats) = ats {
                println!("\tATS={}", hex::encode_upper(ats));
            }

            let command_apdu = [0x90, 0x60, 0x00, 0x00, 0x00];
            println!("C-APDU={}", hex::encode_upper(command_apdu));
            match ctx.transceive_apdu(&command_apdu) {
                Ok(response) => println!("R-APDU={}", hex::encode_upper(response)),
                Err(e) => println!("TransceiveAPDU: {e}"),
            }
        }
        sscp_host::ScanResult::IsoB { uid } => {
            println!("ScanNFC OK, card present, protocol=ISO-B");
            println!("\tUID={}", hex::encode_upper(&uid));
        }
    }

    ctx.close().context("close failed")?;
    show_statistics(&ctx);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    run_self_test()?;
    info!("self-test passed");

    if args.self_test_only {
        return Ok(());
    }

    run_live(&args)
}
