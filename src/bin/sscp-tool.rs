//! Continuous reader poller: authenticate once, then loop scanning for a
//! card and transceiving a fixed "select master file" APDU against it.

use anyhow::{Context, Result};
use clap::Parser;
use sscp_host::{SscpConfig, ScanResult, SscpContext};

#[derive(Parser, Debug)]
#[command(author, version, about = "SSCP continuous polling demo")]
struct Args {
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    #[arg(long, default_value_t = 38400)]
    baudrate: u32,

    #[arg(long, default_value_t = 0x01)]
    address: u8,

    /// Number of scan iterations; 0 loops forever.
    #[arg(long, default_value_t = 0)]
    iterations: u32,
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

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut ctx = SscpContext::new(SscpConfig::default());
    ctx.open(&args.port, args.baudrate)
        .with_context(|| format!("failed to open {}", args.port))?;
    ctx.select_address(args.address).context("select_address failed")?;
    ctx.authenticate(None).context("authenticate failed")?;
    println!("Authenticate OK");
    ctx.outputs(0x02, 0x0A, 0x02).context("outputs failed")?;

    let infos = ctx.get_infos().context("get_infos failed")?;
    println!(
        "GetInfos OK, version={:02X}, baudrate={:02X}, address={:02X}, voltage={:04X}",
        infos.version, infos.baudrate_selector, infos.address, infos.voltage_mv
    );

    let mut iteration = 0u32;
    loop {
        match ctx.scan_nfc() {
            Ok(ScanResult::None) => continue,
            Ok(ScanResult::IsoA { uid, ats, .. }) => {
                println!("ScanNFC OK, card present, protocol=ISO-A");
                println!("\tUID={}", hex::encode_upper(&uid));
                if let Some(ats) = ats {
                    println!("\tATS={}", hex::encode_upper(ats));
                }

                ctx.outputs(0x01, 0x0A, 0x02).ok();

                let select_mf = [0x00, 0xA4, 0x04, 0x00, 0x02, 0x3F, 0x00];
                match ctx.transceive_apdu(&select_mf) {
                    Ok(response) => println!("R-APDU={}", hex::encode_upper(response)),
                    Err(e) => println!("TransceiveAPDU: {e}"),
                }

                ctx.release_rf().ok();
            }
            Ok(ScanResult::IsoB { uid }) => {
                println!("ScanNFC OK, card present, protocol=ISO-B");
                println!("\tUID={}", hex::encode_upper(&uid));
                ctx.release_rf().ok();
            }
            Err(e) => {
                println!("ScanNFC failed: {e}");
                break;
            }
        }

        iteration += 1;
        if args.iterations != 0 && iteration >= args.iterations {
            break;
        }
    }

    ctx.close().context("close failed")?;
    show_statistics(&ctx);
    Ok(())
}
