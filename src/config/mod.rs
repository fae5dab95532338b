//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::physics::Platform;

/// Highest tick or broadcast rate; a loop period must stay at least 1 ms
pub const MAX_RATE_HZ: u32 = 1000;

/// Physics constants shared by every tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsConstants {
    /// Downward acceleration in px/s^2
    pub gravity: f32,
    /// Horizontal speed while a direction is held, px/s
    pub move_speed: f32,
    /// Initial upward speed of a jump, px/s
    pub jump_velocity: f32,
    /// Player hitbox width
    pub player_width: f32,
    /// Player hitbox height
    pub player_height: f32,
}

impl Default for PhysicsConstants {
    fn default() -> Self {
        Self {
            gravity: 1500.0,
            move_speed: 400.0,
            jump_velocity: 700.0,
            player_width: 40.0,
            player_height: 60.0,
        }
    }
}

/// Where new players appear
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnConfig {
    pub x: f32,
    pub y: f32,
    /// Horizontal offset added per player already in the world
    pub spacing: f32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            x: 100.0,
            y: 300.0,
            spacing: 50.0,
        }
    }
}

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,

    /// Physics ticks per second
    pub tick_rate: u32,
    /// Snapshots per second
    pub broadcast_rate: u32,
    /// Upper bound for a single physics step, seconds
    pub max_dt: f32,
    pub physics: PhysicsConstants,
    pub spawn: SpawnConfig,
    /// Static level geometry, resolved in this order
    pub platforms: Vec<Platform>,
    /// Players without input for this long are evicted
    pub stale_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8765)),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            tick_rate: 60,
            broadcast_rate: 20,
            max_dt: 0.1,
            physics: PhysicsConstants::default(),
            spawn: SpawnConfig::default(),
            platforms: default_platforms(),
            stale_timeout: Duration::from_secs(10),
        }
    }
}

/// The stock level: ground plus three floating ledges
pub fn default_platforms() -> Vec<Platform> {
    vec![
        Platform::new(0.0, 980.0, 1920.0, 250.0),
        Platform::new(300.0, 800.0, 300.0, 20.0),
        Platform::new(700.0, 600.0, 300.0, 20.0),
        Platform::new(1100.0, 400.0, 300.0, 20.0),
    ]
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| defaults.server_addr.to_string())
        };

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        let platforms = match env::var("PLATFORMS") {
            Ok(raw) => serde_json::from_str(&raw).map_err(|_| ConfigError::Invalid("PLATFORMS"))?,
            Err(_) => defaults.platforms,
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,

            tick_rate: parse_var("TICK_RATE", defaults.tick_rate)?,
            broadcast_rate: parse_var("BROADCAST_RATE", defaults.broadcast_rate)?,
            max_dt: parse_var("MAX_DT_SECS", defaults.max_dt)?,
            physics: PhysicsConstants {
                gravity: parse_var("GRAVITY", defaults.physics.gravity)?,
                move_speed: parse_var("MOVE_SPEED", defaults.physics.move_speed)?,
                jump_velocity: parse_var("JUMP_VELOCITY", defaults.physics.jump_velocity)?,
                player_width: parse_var("PLAYER_WIDTH", defaults.physics.player_width)?,
                player_height: parse_var("PLAYER_HEIGHT", defaults.physics.player_height)?,
            },
            spawn: SpawnConfig {
                x: parse_var("SPAWN_X", defaults.spawn.x)?,
                y: parse_var("SPAWN_Y", defaults.spawn.y)?,
                spacing: parse_var("SPAWN_SPACING", defaults.spawn.spacing)?,
            },
            platforms,
            stale_timeout: parse_secs("STALE_TIMEOUT_SECS", defaults.stale_timeout)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the loops cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_RATE_HZ).contains(&self.tick_rate) {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }
        if !(1..=MAX_RATE_HZ).contains(&self.broadcast_rate) {
            return Err(ConfigError::Invalid("BROADCAST_RATE"));
        }
        if !(self.max_dt.is_finite() && self.max_dt > 0.0) {
            return Err(ConfigError::Invalid("MAX_DT_SECS"));
        }

        let p = &self.physics;
        let finite = [p.gravity, p.move_speed, p.jump_velocity, p.player_width, p.player_height];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::Invalid("physics constants"));
        }
        if p.player_width <= 0.0 || p.player_height <= 0.0 {
            return Err(ConfigError::Invalid("player hitbox"));
        }

        if self.platforms.iter().any(|pl| !pl.is_valid()) {
            return Err(ConfigError::Invalid("PLATFORMS"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

fn parse_secs(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let secs: f32 = parse_var(name, default.as_secs_f32())?;
    match Duration::try_from_secs_f32(secs) {
        Ok(timeout) if !timeout.is_zero() => Ok(timeout),
        _ => Err(ConfigError::Invalid(name)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
