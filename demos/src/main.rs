//! Prints a generated cave with the player's view and a chase path.
//!
//! Run: cargo run --bin delve-demo [seed]

use delve_demo::{Demo, Movement, SIGHT};

fn main() {
    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(42);
    let mut demo = match Demo::new(seed) {
        Ok(demo) => demo,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let walk = demo.sectors(Movement::Walk);
    let regions = walk.num_sectors();
    let main = walk.largest().map_or(0, |id| walk.size(id));
    println!("seed {seed}: {regions} walkable regions, main region {main} cells");
    println!("portals: {}", demo.portals().len());

    let nearby = demo.nearby_monsters(2 * SIGHT);
    println!("{} of {} monsters within {}", nearby.len(), demo.monsters.len(), 2 * SIGHT);

    let mut shown = Vec::new();
    if let Some(&h) = nearby.first() {
        if let Some(mut chase) = demo.chase(h) {
            if chase.path().is_empty() {
                println!("nearest monster cannot reach the player");
            } else {
                shown = chase.path().steps().collect();
                println!("nearest monster is {} moves away", chase.path().len());
                if demo.step_monster(h, &mut chase) {
                    println!("it takes one step");
                }
            }
        }
        if let Some(flee) = demo.flee(h) {
            println!(
                "fleeing would take {} moves to {}",
                flee.len(),
                flee.target()
            );
        }
    }

    print!("{}", demo.render(&shown));
}
