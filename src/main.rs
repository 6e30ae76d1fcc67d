#[tokio::main]
async fn main() {
    if let Err(err) = cloudcost_sql_lib::run().await {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
