use std::{process::ExitCode, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use listing_crawler::{etf_listing, logging, stock_listing, Table};

#[cfg(all(target_os = "linux", target_env = "musl"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "listing_crawler")]
#[command(about = "Stock and ETF listing crawler", long_about = None)]
#[command(version)]
struct Cli {
    /// 以縮排格式輸出 JSON
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 股票清單 (KRX, KOSPI, KOSDAQ, KONEX, KRX-DELISTING, KRX-MARCAP, KRX-ADMINISTRATIVE, NYSE ...)
    Stock {
        market: String,

        /// 附加財務指標與衍生欄位
        #[arg(long)]
        all: bool,
    },

    /// ETF 清單 (KR, US, CN, HK, JP, UK, FR, MAJOR, BOND)
    Etf { country: String },
}

async fn run(cli: &Cli) -> Result<Table> {
    match &cli.command {
        Commands::Stock { market, all } => stock_listing(market, *all).await,
        Commands::Etf { country } => etf_listing(country).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let output = run(&cli).await.and_then(|table| {
        let json = if cli.pretty {
            serde_json::to_string_pretty(&table)?
        } else {
            serde_json::to_string(&table)?
        };
        Ok(json)
    });

    let code = match output {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(why) => {
            logging::error_console(format!("{:#}", why));
            logging::error_file_async(format!("{:?}", why));
            ExitCode::FAILURE
        }
    };

    // 背景線程還沒寫完的日誌在結束前寫入檔案
    logging::flush(Duration::from_secs(3)).await;
    code
}
