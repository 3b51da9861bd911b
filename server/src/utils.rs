use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{PlayerId, PLAYER_COLORS};

/// Length of generated connection ids
pub const PLAYER_ID_LEN: usize = 20;

// Generate a connection-scoped player id
pub fn generate_player_id<R: Rng + ?Sized>(rng: &mut R) -> PlayerId {
    (0..PLAYER_ID_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

// Pick a display color uniformly from the palette, with replacement
pub fn pick_color<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    PLAYER_COLORS[rng.gen_range(0..PLAYER_COLORS.len())]
}
