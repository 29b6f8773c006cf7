//! A ship with an engine, a heat sink and a fuse.
//!
//! Run with `RUST_LOG=tessera=debug cargo run --example demo` to watch the
//! lifecycle unfold.

use tessera::prelude::*;

struct Ship {
    distance: f32,
}

impl Behaviour for Ship {
    fn init(&mut self, cx: &mut Context) {
        cx.subscribe(Channel::Step).ok();
        cx.subscribe(Channel::PostStep).ok();
    }

    fn step(&mut self, cx: &mut Context) {
        let thrust = cx.get_sub::<Engine>().map_or(0.0, |e| e.thrust);
        self.distance += thrust;
    }

    fn post_step(&mut self, _cx: &mut Context) {
        println!("ship at {:.1}", self.distance);
    }
}

struct Engine {
    thrust: f32,
    heat: f32,
}

impl Behaviour for Engine {
    fn init(&mut self, cx: &mut Context) {
        cx.subscribe(Channel::Step).ok();
    }

    fn step(&mut self, _cx: &mut Context) {
        self.heat += self.thrust * 0.5;
    }
}

/// Bleeds heat off the engine; runs after it.
struct HeatSink {
    rate: f32,
}

impl Behaviour for HeatSink {
    fn init(&mut self, cx: &mut Context) {
        cx.subscribe(Channel::Step).ok();
    }

    fn step(&mut self, cx: &mut Context) {
        let rate = self.rate;
        if let Some(engine) = cx.get_sub_mut::<Engine>() {
            engine.heat = (engine.heat - rate).max(0.0);
        }
    }
}

/// Blows the ship up once the engine overheats.
struct Fuse {
    limit: f32,
}

impl Behaviour for Fuse {
    fn init(&mut self, cx: &mut Context) {
        cx.subscribe(Channel::Step).ok();
    }

    fn step(&mut self, cx: &mut Context) {
        let heat = cx.get_sub::<Engine>().map_or(0.0, |e| e.heat);
        if heat > self.limit {
            log::warn!("engine at {heat:.1}, fuse blown");
            cx.destroy_game_object().ok();
        }
    }
}

fn main() -> tessera::Result<()> {
    env_logger::init();

    let mut world = World::new(Config::default())?;

    let mut builder = MainBuilder::new(Ship { distance: 0.0 })
        .with_sub(SubDesc::new(Engine { thrust: 2.0, heat: 0.0 }).priority(Priority::new(1)?))
        .with_sub(SubDesc::new(HeatSink { rate: 0.6 }).priority(Priority::new(2)?))
        .with_sub(SubDesc::new(Fuse { limit: 3.0 }).priority(Priority::new(15)?).on_root());
    builder
        .hooks_mut()
        .lifecycle
        .before_destroyed
        .add(|id| println!("{id} destroyed"));

    let ship = world.initialize(builder, &SceneContext::default())?;

    for _ in 0..10 {
        world.tick();
        if !world.entities().is_live_main(ship) {
            break;
        }
    }

    world.shutdown();
    Ok(())
}
