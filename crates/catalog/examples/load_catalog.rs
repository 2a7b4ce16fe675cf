use beer_catalog::Catalog;
use std::path::Path;
use std::time::Instant;

fn main() {
    let path = Path::new("data/dump/beer_final.tsv");

    println!("Loading beer catalog...\n");

    let start = Instant::now();
    let catalog = Catalog::load_from_file(path)
        .expect("Failed to load beer catalog");
    let elapsed = start.elapsed();

    let names = catalog.list_display_names();

    println!("\n=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Beers: {}", catalog.len());
    println!("Dropdown entries: {}", names.len());
    println!("\nPerformance: {:.0} beers/second",
             catalog.len() as f64 / elapsed.as_secs_f64());
}
