use std::io::Read;

use rust_jq::run;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let program = std::env::args().nth(1).unwrap_or_else(|| String::from("."));

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    println!("{}", run(&program, &input)?);

    Ok(())
}
