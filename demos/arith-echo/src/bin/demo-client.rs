use std::fmt::Debug;

use anyhow::{bail, Context};
use clap::Parser;
use switchboard_demo::{
    ArithClient, ArithRequest, ArithResponse, EchoClient, EchoRequest, EchoResponse,
};
use switchboard_rpc::Client;

#[derive(Parser)]
#[command(name = "demo-client", version, about = "Run a round of calls against demo-server")]
struct Cli {
    /// Socket kind to connect over: tcp or unix
    #[arg(long, default_value = "tcp")]
    network: String,

    /// host:port for tcp, a socket path for unix
    #[arg(long, default_value = "127.0.0.1:1234")]
    address: String,

    /// Text sent to the echo service
    #[arg(long, default_value = "Hello, switchboard!")]
    message: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let client = Client::dial(&cli.network, &cli.address)
        .await
        .with_context(|| format!("connecting to {} {}", cli.network, cli.address))?;

    let arith = ArithClient::new(&client);
    check("ArithService.Add", arith.add(&ArithRequest::new(1, 2)).await?.c, 3)?;
    check("ArithService.Mul", arith.mul(&ArithRequest::new(3, 4)).await?.c, 12)?;
    check("ArithService.Div", arith.div(&ArithRequest::new(13, 5)).await?.c, 2)?;
    check_error(
        "ArithService.Div by zero",
        arith.div(&ArithRequest::new(1, 0)).await,
        "divide by zero",
    )?;
    check_error(
        "ArithService.Error",
        arith.error(&ArithRequest::new(1, 0)).await,
        "ArithError",
    )?;

    let echo = EchoClient::new(&client);
    let request = EchoRequest::new(cli.message.as_str());
    check("EchoService.Echo", echo.echo(&request).await?.msg, cli.message.clone())?;
    check(
        "EchoService.EchoTwice",
        echo.echo_twice(&request).await?.msg,
        cli.message.repeat(2),
    )?;

    // Untyped call by name
    let reply: EchoResponse = client.call("EchoService.Echo", &request).await?;
    check("EchoService.Echo by name", reply.msg, cli.message.clone())?;

    client.close().await?;
    println!("Done.");
    Ok(())
}

fn check<T: PartialEq + Debug>(what: &str, got: T, expected: T) -> anyhow::Result<()> {
    if got != expected {
        bail!("{}: expected {:?}, got {:?}", what, expected, got);
    }
    println!("{}: ok", what);
    Ok(())
}

fn check_error(
    what: &str,
    result: switchboard_rpc::Result<ArithResponse>,
    expected: &str,
) -> anyhow::Result<()> {
    match result {
        Err(e) if e.to_string() == expected => {
            println!("{}: ok", what);
            Ok(())
        }
        other => bail!("{}: expected error {:?}, got {:?}", what, expected, other),
    }
}
