use glam::DVec2;

use skirmish::{
    Category, EntityDelta, EntityState, FieldValue, Reconciler, Replicated, WorldState,
};

use crate::config::ServerConfig;

const PLAYER_SPEED: f64 = 90.0;
const ENEMY_SPEED: f64 = 40.0;
const BOLT_SPEED: f64 = 260.0;
const BOLT_TTL: u32 = 40;
const BOLT_DAMAGE: i64 = 10;
const FIRE_INTERVAL: u32 = 10;
const HIT_RADIUS: f64 = 14.0;
const CONTACT_RADIUS: f64 = 10.0;
const PLAYER_HEALTH: i64 = 100;
const ENEMY_HEALTH: i64 = 30;
const CRATE_HEALTH: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    Player,
    Grunt,
    Bolt,
    Crate,
    Pillar,
}

impl ActorKind {
    pub fn type_tag(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Grunt => "grunt",
            Self::Bolt => "bolt",
            Self::Crate => "crate",
            Self::Pillar => "pillar",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "player" => Some(Self::Player),
            "grunt" => Some(Self::Grunt),
            "bolt" => Some(Self::Bolt),
            "crate" => Some(Self::Crate),
            "pillar" => Some(Self::Pillar),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub kind: ActorKind,
    pub position: DVec2,
    pub velocity: DVec2,
    pub health: i64,
    pub rotation: f64,
    pub net_version: u64,
    pub dead: bool,
    pub ttl: u32,
    pub owner: Option<String>,
}

impl Actor {
    pub fn new(id: String, kind: ActorKind, position: DVec2, health: i64) -> Self {
        Self {
            id,
            kind,
            position,
            velocity: DVec2::ZERO,
            health,
            rotation: 0.0,
            net_version: 1,
            dead: false,
            ttl: 0,
            owner: None,
        }
    }

    /// Client-side view built from the first record seen for an id.
    pub fn from_record(record: &EntityDelta) -> Option<Self> {
        let kind = ActorKind::from_tag(record.entity_type.as_deref()?)?;
        let mut actor = Self::new(record.id.clone(), kind, record.position()?, 0);
        actor.apply_delta(record);
        Some(actor)
    }

    fn touch(&mut self) {
        self.net_version += 1;
    }

    fn damage(&mut self, amount: i64) {
        self.health = (self.health - amount).max(0);
        if self.health == 0 {
            self.dead = true;
        }
        self.touch();
    }
}

impl Replicated for Actor {
    fn network_id(&self) -> &str {
        &self.id
    }

    fn network_state(&self) -> Option<EntityState> {
        if self.kind == ActorKind::Pillar {
            return None;
        }

        let mut state =
            EntityState::new(&self.id, self.kind.type_tag(), self.position.x, self.position.y);
        state.net_version = self.net_version;
        state.is_dead = self.dead;
        match self.kind {
            ActorKind::Player => {
                state.set_field("health", self.health);
                state.set_field("rotation", (self.rotation * 100.0).round() / 100.0);
            }
            ActorKind::Grunt | ActorKind::Crate => {
                state.set_field("health", self.health);
            }
            ActorKind::Bolt => {
                state.set_field("damage", BOLT_DAMAGE);
                if let Some(owner) = &self.owner {
                    state.set_field("owner", owner.as_str());
                }
            }
            ActorKind::Pillar => {}
        }
        Some(state)
    }

    fn apply_delta(&mut self, delta: &EntityDelta) {
        if let Some(x) = delta.x {
            self.position.x = x;
        }
        if let Some(y) = delta.y {
            self.position.y = y;
        }
        if let Some(net_version) = delta.net_version {
            self.net_version = net_version;
        }
        if let Some(is_dead) = delta.is_dead {
            self.dead = is_dead;
        }
        if let Some(health) = delta.field("health").and_then(FieldValue::as_i64) {
            self.health = health;
        }
        if let Some(rotation) = delta.field("rotation").and_then(FieldValue::as_f64) {
            self.rotation = rotation;
        }
    }

    fn reconcile(&mut self, authoritative: &EntityState) {
        let Some(mut predicted) = self.network_state() else {
            return;
        };
        Reconciler::default().reconcile(&mut predicted, authoritative);
        self.position = predicted.position();
        self.dead = predicted.is_dead;
        if let Some(health) = predicted.field("health").and_then(FieldValue::as_i64) {
            self.health = health;
        }
    }

    fn is_destroyed(&self) -> bool {
        self.dead
    }
}

/// xorshift64*; deterministic per seed so runs are reproducible.
#[derive(Debug, Clone)]
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

/// Authoritative arena simulation. Dead actors are replicated once with
/// `isDead` set and dropped on the following step.
#[derive(Debug)]
pub struct Arena {
    pub players: Vec<Actor>,
    pub enemies: Vec<Actor>,
    pub projectiles: Vec<Actor>,
    pub walls: Vec<Actor>,
    pub score: i64,
    pub wave: i64,
    size: f64,
    enemies_per_wave: usize,
    rng: Rng,
    next_id: u32,
    steps: u32,
}

impl Arena {
    pub fn new(config: &ServerConfig) -> Self {
        let mut arena = Self {
            players: Vec::new(),
            enemies: Vec::new(),
            projectiles: Vec::new(),
            walls: Vec::new(),
            score: 0,
            wave: 0,
            size: config.arena_size,
            enemies_per_wave: config.enemies,
            rng: Rng::new(config.seed),
            next_id: 0,
            steps: 0,
        };

        for i in 0..config.players {
            let position = arena.random_position();
            arena.players.push(Actor::new(
                format!("p{}", i + 1),
                ActorKind::Player,
                position,
                PLAYER_HEALTH,
            ));
        }
        for i in 0..config.walls {
            let position = arena.random_position();
            let (kind, health) = if i % 3 == 2 {
                (ActorKind::Pillar, 0)
            } else {
                (ActorKind::Crate, CRATE_HEALTH)
            };
            arena
                .walls
                .push(Actor::new(format!("w{}", i + 1), kind, position, health));
        }
        arena.spawn_wave();
        arena
    }

    pub fn step(&mut self, dt: f64) {
        self.steps = self.steps.wrapping_add(1);
        for actors in [
            &mut self.players,
            &mut self.enemies,
            &mut self.projectiles,
            &mut self.walls,
        ] {
            actors.retain(|actor| !actor.dead);
        }

        self.move_players(dt);
        self.move_enemies(dt);
        self.move_projectiles(dt);
        self.resolve_hits();

        if self.enemies.is_empty() {
            self.spawn_wave();
        }
    }

    pub fn world(&self) -> WorldState {
        let mut world = WorldState::new();
        world.collect(Category::Players, &self.players);
        world.collect(Category::Enemies, &self.enemies);
        world.collect(Category::Projectiles, &self.projectiles);
        world.collect(Category::Walls, &self.walls);
        world.set_meta("score", self.score);
        world.set_meta("wave", self.wave);
        world
    }

    fn move_players(&mut self, dt: f64) {
        let half = self.size / 2.0;
        let fire = self.steps % FIRE_INTERVAL == 0;
        let mut shots = Vec::new();

        for player in &mut self.players {
            player.rotation += self.rng.range(-0.3, 0.3);
            player.velocity = DVec2::from_angle(player.rotation) * PLAYER_SPEED;
            player.position =
                (player.position + player.velocity * dt).clamp(DVec2::splat(-half), DVec2::splat(half));
            player.touch();

            if fire {
                let target = self
                    .enemies
                    .iter()
                    .min_by(|a, b| {
                        a.position
                            .distance_squared(player.position)
                            .total_cmp(&b.position.distance_squared(player.position))
                    })
                    .map(|enemy| enemy.position);
                if let Some(target) = target {
                    shots.push((player.id.clone(), player.position, target));
                }
            }
        }

        for (owner, from, target) in shots {
            let id = self.allocate_id("b");
            let mut bolt = Actor::new(id, ActorKind::Bolt, from, 0);
            bolt.velocity = (target - from).normalize_or_zero() * BOLT_SPEED;
            bolt.ttl = BOLT_TTL;
            bolt.owner = Some(owner);
            self.projectiles.push(bolt);
        }
    }

    fn move_enemies(&mut self, dt: f64) {
        for enemy in &mut self.enemies {
            let target = self
                .players
                .iter()
                .min_by(|a, b| {
                    a.position
                        .distance_squared(enemy.position)
                        .total_cmp(&b.position.distance_squared(enemy.position))
                })
                .map(|player| player.position);
            if let Some(target) = target {
                enemy.velocity = (target - enemy.position).normalize_or_zero() * ENEMY_SPEED;
                enemy.position += enemy.velocity * dt;
                enemy.touch();
            }
        }
    }

    fn move_projectiles(&mut self, dt: f64) {
        for bolt in &mut self.projectiles {
            bolt.position += bolt.velocity * dt;
            bolt.ttl = bolt.ttl.saturating_sub(1);
            if bolt.ttl == 0 {
                bolt.dead = true;
            }
            bolt.touch();
        }
    }

    fn resolve_hits(&mut self) {
        for bolt in self.projectiles.iter_mut().filter(|b| !b.dead) {
            let target = self
                .enemies
                .iter_mut()
                .chain(self.walls.iter_mut().filter(|w| w.kind == ActorKind::Crate))
                .find(|target| !target.dead && target.position.distance(bolt.position) < HIT_RADIUS);
            if let Some(target) = target {
                target.damage(BOLT_DAMAGE);
                if target.dead && target.kind == ActorKind::Grunt {
                    self.score += 10;
                }
                bolt.dead = true;
                bolt.touch();
            }
        }

        let half = self.size / 2.0;
        for enemy in &self.enemies {
            for player in &mut self.players {
                if player.position.distance(enemy.position) < CONTACT_RADIUS {
                    player.damage(1);
                }
            }
        }
        for player in &mut self.players {
            if player.dead {
                // Respawn in place of a death; the jump shows up as a snap.
                player.dead = false;
                player.health = PLAYER_HEALTH;
                player.position = DVec2::new(self.rng.range(-half, half), self.rng.range(-half, half));
                player.touch();
            }
        }
    }

    fn spawn_wave(&mut self) {
        self.wave += 1;
        for _ in 0..self.enemies_per_wave {
            let id = self.allocate_id("e");
            let position = self.random_position();
            self.enemies
                .push(Actor::new(id, ActorKind::Grunt, position, ENEMY_HEALTH));
        }
        log::debug!("Wave {} spawned", self.wave);
    }

    fn random_position(&mut self) -> DVec2 {
        let half = self.size / 2.0;
        DVec2::new(self.rng.range(-half, half), self.rng.range(-half, half))
    }

    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            players: 2,
            enemies: 3,
            walls: 3,
            ..Default::default()
        }
    }

    #[test]
    fn pillars_opt_out_of_sync() {
        let arena = Arena::new(&config());
        let world = arena.world();

        assert_eq!(arena.walls.len(), 3);
        assert_eq!(world.walls.len(), 2);
        assert!(world.walls.values().all(|w| w.entity_type == "crate"));
        assert_eq!(world.enemies.len(), 3);
        assert_eq!(world.meta.get("wave"), Some(&FieldValue::Int(1)));
    }

    #[test]
    fn players_fire_bolts() {
        let mut arena = Arena::new(&config());
        for _ in 0..FIRE_INTERVAL {
            arena.step(0.05);
        }
        assert!(!arena.projectiles.is_empty());
        assert!(arena.projectiles.iter().all(|b| b.owner.is_some()));
    }

    #[test]
    fn same_seed_same_world() {
        let mut a = Arena::new(&config());
        let mut b = Arena::new(&config());
        for _ in 0..25 {
            a.step(0.05);
            b.step(0.05);
        }
        assert_eq!(a.world(), b.world());
    }

    #[test]
    fn delta_updates_actor_fields() {
        let mut actor = Actor::new("e1".into(), ActorKind::Grunt, DVec2::ZERO, ENEMY_HEALTH);
        let delta = EntityDelta {
            is_dead: Some(true),
            ..EntityDelta::new("e1")
                .with_position(5.0, 6.0)
                .with_field("health", 0)
                .with_field("unknown", "ignored")
        };

        actor.apply_delta(&delta);

        assert!(actor.is_destroyed());
        assert_eq!(actor.health, 0);
        assert_eq!(actor.position, DVec2::new(5.0, 6.0));
    }

    #[test]
    fn record_without_type_builds_no_actor() {
        let record = EntityDelta::new("e1").with_position(1.0, 1.0);
        assert!(Actor::from_record(&record).is_none());

        let typed = EntityDelta {
            entity_type: Some("grunt".into()),
            ..record.with_field("health", 12)
        };
        let actor = Actor::from_record(&typed).unwrap();
        assert_eq!(actor.kind, ActorKind::Grunt);
        assert_eq!(actor.health, 12);
    }

    #[test]
    fn rng_stays_in_range() {
        let mut rng = Rng::new(7);
        for _ in 0..1000 {
            let value = rng.range(-5.0, 5.0);
            assert!((-5.0..5.0).contains(&value));
        }
    }
}
