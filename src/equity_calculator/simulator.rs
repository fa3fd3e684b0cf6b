use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use rand::{thread_rng, SeedableRng};
use rand_xoshiro::Xoroshiro128Plus;
use rustc_hash::FxHashMap;

use super::combined_range::CombinedRange;
use crate::constants::{BOARD_CARDS, CARD_COUNT, MAX_PLAYERS, RANK_MASK, SUIT_COUNT, SUIT_MASK};
use crate::fastdivide::DividerU64;
use crate::hand_evaluator::{Hand, CARDS};
use crate::hand_range::HandRange;
use crate::rng::{FastUniformInt, UniqueRng64};

/// Preflop cache is flushed when it grows past this many entries.
const MAX_LOOKUP_SIZE: usize = 1_000_000;

/// Consecutive failed holecard draws before a monte carlo worker gives up.
/// 1000 rejections without a single successful evaluation means the range
/// configuration is practically infeasible; giving up beats spinning forever.
const MAX_HOLECARD_REJECTS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatorError {
    TooFewPlayers,
    TooManyPlayers,
    TooManyBoardCards,
    TooManyDeadCards,
    ConflictingRanges,
}

impl fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SimulatorError::TooFewPlayers => "need at least one player",
            SimulatorError::TooManyPlayers => "too many players",
            SimulatorError::TooManyBoardCards => "more than 5 board cards",
            SimulatorError::TooManyDeadCards => "not enough cards left in the deck",
            SimulatorError::ConflictingRanges => "a range has no valid holecard combination",
        };
        write!(f, "{}", s)
    }
}

impl std::error::Error for SimulatorError {}

/// Knobs for a simulation run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationOptions {
    /// Number of worker threads; 0 uses all hardware threads.
    pub n_threads: u8,
    /// Monte carlo stops once the standard deviation of the first player's
    /// equity falls below this.
    pub stdev_target: f64,
    /// Seconds between callback invocations.
    pub update_interval: f64,
    /// Wall clock limit in seconds; 0 disables.
    pub time_limit: f64,
    /// Stop after this many evaluated hands; 0 disables.
    pub hand_limit: u64,
    /// Use the random walk sampler for monte carlo. Turning it off samples
    /// every trial independently by rejection, which is slower for
    /// overlapping ranges.
    pub random_walk: bool,
}

impl Default for SimulationOptions {
    fn default() -> SimulationOptions {
        SimulationOptions {
            n_threads: 0,
            stdev_target: 5e-5,
            update_interval: 0.1,
            time_limit: 0.0,
            hand_limit: 0,
            random_walk: true,
        }
    }
}

/// Results of a simulation, also handed to the progress callback.
#[derive(Debug, Clone)]
pub struct SimulationResults {
    /// Number of players.
    pub players: usize,
    /// Equity per player in [0, 1]: (wins + tie shares) / hands.
    pub equities: Vec<f64>,
    /// Outright wins per player.
    pub wins: Vec<u64>,
    /// Tie shares per player; a k-way split counts 1/k.
    pub ties: Vec<f64>,
    /// Wins for each combination of tying players, indexed by player bitmask.
    /// Index 0 (no winners) stays 0.
    pub wins_by_mask: Vec<u64>,
    /// Evaluated deals so far, weighted by isomorphism multipliers.
    pub hands: u64,
    /// Deals evaluated since the last callback.
    pub interval_hands: u64,
    /// Hands per second overall / since the last callback.
    pub speed: f64,
    pub interval_speed: f64,
    /// Seconds spent overall / since the last callback.
    pub time: f64,
    pub interval_time: f64,
    /// Standard deviation of the first player's equity estimate.
    pub stdev: f64,
    /// Standard deviation of a single-hand sample.
    pub stdev_per_hand: f64,
    /// Progress in [0, 1]; hand counts for enumeration, stdev target for
    /// monte carlo.
    pub progress: f64,
    /// Size of the preflop space for the given ranges.
    pub preflop_combos: u64,
    /// Preflops skipped because players' cards collide. (Enumeration only.)
    pub skipped_preflop_combos: u64,
    /// Preflops that went through full postflop enumeration.
    pub evaluated_preflop_combos: u64,
    /// Showdowns actually evaluated (cache hits and isomorphism weights
    /// excluded).
    pub evaluations: u64,
    /// Whether this run enumerates exhaustively or samples.
    pub enumerate_all: bool,
    /// True once all workers have drained.
    pub finished: bool,
}

impl SimulationResults {
    fn new(n_players: usize, enumerate_all: bool) -> SimulationResults {
        SimulationResults {
            players: n_players,
            equities: vec![0.0; n_players],
            wins: vec![0; n_players],
            ties: vec![0.0; n_players],
            wins_by_mask: vec![0; 1 << n_players],
            hands: 0,
            interval_hands: 0,
            speed: 0.0,
            interval_speed: 0.0,
            time: 0.0,
            interval_time: 0.0,
            stdev: 0.0,
            stdev_per_hand: 0.0,
            progress: 0.0,
            preflop_combos: 0,
            skipped_preflop_combos: 0,
            evaluated_preflop_combos: 0,
            evaluations: 0,
            enumerate_all,
            finished: false,
        }
    }
}

/// Results buffered by one worker between merges, with the remap table from
/// batch player positions back to original player indexes.
#[derive(Debug, Clone, Copy)]
struct BatchResults {
    wins_by_mask: [u64; 1 << MAX_PLAYERS],
    player_ids: [usize; MAX_PLAYERS],
    skipped_preflop_combos: u64,
    unique_preflop_combos: u64,
    eval_count: u64,
}

impl BatchResults {
    fn new(n_players: usize) -> BatchResults {
        let mut player_ids = [0usize; MAX_PLAYERS];
        for (i, id) in player_ids.iter_mut().enumerate().take(n_players) {
            *id = i;
        }
        BatchResults {
            wins_by_mask: [0; 1 << MAX_PLAYERS],
            player_ids,
            skipped_preflop_combos: 0,
            unique_preflop_combos: 0,
            eval_count: 0,
        }
    }
}

/// Hole cards of one player while they are being sorted into canonical order.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct HandWithIndex {
    cards: (u8, u8),
    player_idx: usize,
}

impl Default for HandWithIndex {
    fn default() -> Self {
        HandWithIndex {
            cards: (52, 52),
            player_idx: 0,
        }
    }
}

impl Ord for HandWithIndex {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        if (self.cards.0 >> 2) != (other.cards.0 >> 2) {
            return (self.cards.0 >> 2).cmp(&(other.cards.0 >> 2));
        }
        if (self.cards.1 >> 2) != (other.cards.1 >> 2) {
            return (self.cards.1 >> 2).cmp(&(other.cards.1 >> 2));
        }
        if (self.cards.0 & 3) != (other.cards.0 & 3) {
            return (self.cards.0 & 3).cmp(&(other.cards.0 & 3));
        }
        (self.cards.1 & 3).cmp(&(other.cards.1 & 3))
    }
}

impl PartialOrd for HandWithIndex {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// Calculates exact range vs range equities by enumerating every possible
/// deal.
///
/// # Arguments
///
/// * `hand_ranges` Array of hand ranges, one per player
/// * `board_mask` 52 bit mask of public cards
/// * `dead_mask` 52 bit mask of dead cards
/// * `options` Thread count, limits and callback interval
/// * `cancel_token` A shared boolean that stops the simulation when set
/// * `callback` Invoked with intermediate results about every
///   `options.update_interval` seconds, from a worker thread while the
///   result lock is held; it must not block and must not call back into the
///   simulation (setting the cancel token is fine)
///
/// # Example
/// ```no_run
/// use std::sync::{atomic::AtomicBool, Arc};
/// use showdown::{exact_equity, get_card_mask, HandRange, SimulationOptions, SimulationResults};
///
/// let ranges = HandRange::from_strings(vec!["AA".to_string(), "random".to_string()]);
/// let results = exact_equity(
///     &ranges,
///     get_card_mask(""),
///     get_card_mask(""),
///     SimulationOptions::default(),
///     Arc::new(AtomicBool::new(false)),
///     |update: &SimulationResults| eprintln!("{:.1}%", 100.0 * update.progress),
/// )
/// .unwrap();
/// println!("{:?}", results.equities);
/// ```
pub fn exact_equity<F>(
    hand_ranges: &[HandRange],
    board_mask: u64,
    dead_mask: u64,
    options: SimulationOptions,
    cancel_token: Arc<AtomicBool>,
    callback: F,
) -> Result<SimulationResults, SimulatorError>
where
    F: Fn(&SimulationResults) + Sync,
{
    run_simulation(
        hand_ranges,
        board_mask,
        dead_mask,
        true,
        options,
        cancel_token,
        callback,
    )
}

/// Estimates range vs range equities with monte carlo simulation.
///
/// Stops when the standard deviation of the first player's equity drops below
/// `options.stdev_target`, or on any configured limit or the cancel token.
/// Arguments are the same as for [`exact_equity`].
///
/// # Example
/// ```no_run
/// use std::sync::{atomic::AtomicBool, Arc};
/// use showdown::{approx_equity, get_card_mask, HandRange, SimulationOptions, SimulationResults};
///
/// let ranges = HandRange::from_strings(vec!["AK,22+".to_string(), "random".to_string()]);
/// let board_mask = get_card_mask("2h3d4c");
/// let results = approx_equity(
///     &ranges,
///     board_mask,
///     get_card_mask(""),
///     SimulationOptions::default(),
///     Arc::new(AtomicBool::new(false)),
///     |_: &SimulationResults| {},
/// )
/// .unwrap();
/// println!("{:?}", results.equities);
/// ```
pub fn approx_equity<F>(
    hand_ranges: &[HandRange],
    board_mask: u64,
    dead_mask: u64,
    options: SimulationOptions,
    cancel_token: Arc<AtomicBool>,
    callback: F,
) -> Result<SimulationResults, SimulatorError>
where
    F: Fn(&SimulationResults) + Sync,
{
    run_simulation(
        hand_ranges,
        board_mask,
        dead_mask,
        false,
        options,
        cancel_token,
        callback,
    )
}

fn run_simulation<F>(
    hand_ranges: &[HandRange],
    board_mask: u64,
    dead_mask: u64,
    enumerate_all: bool,
    options: SimulationOptions,
    cancel_token: Arc<AtomicBool>,
    callback: F,
) -> Result<SimulationResults, SimulatorError>
where
    F: Fn(&SimulationResults) + Sync,
{
    if hand_ranges.is_empty() {
        return Err(SimulatorError::TooFewPlayers);
    }
    if hand_ranges.len() > MAX_PLAYERS {
        return Err(SimulatorError::TooManyPlayers);
    }
    if board_mask.count_ones() > BOARD_CARDS {
        return Err(SimulatorError::TooManyBoardCards);
    }
    if 2 * hand_ranges.len() as u32 + dead_mask.count_ones() + BOARD_CARDS > u32::from(CARD_COUNT)
    {
        return Err(SimulatorError::TooManyDeadCards);
    }

    let mut hand_ranges = hand_ranges.to_owned();
    hand_ranges
        .iter_mut()
        .for_each(|h| h.remove_conflicting_combos(board_mask, dead_mask));
    if hand_ranges.iter().any(|h| h.hands.is_empty()) {
        return Err(SimulatorError::ConflictingRanges);
    }

    let mut combined_ranges = CombinedRange::from_ranges(&hand_ranges);
    let mut rng = Xoroshiro128Plus::from_rng(thread_rng()).unwrap();
    for cr in &mut combined_ranges {
        if cr.size() == 0 {
            return Err(SimulatorError::ConflictingRanges);
        }
        if !enumerate_all {
            cr.shuffle(&mut rng);
        }
    }

    let n_threads = if options.n_threads == 0 {
        thread::available_parallelism().map_or(1, |n| n.get())
    } else {
        usize::from(options.n_threads)
    };

    let sim = Arc::new(Simulator::new(
        combined_ranges,
        hand_ranges.len(),
        board_mask,
        dead_mask,
        enumerate_all,
        &options,
        n_threads as u32,
        cancel_token,
    ));

    thread::scope(|scope| {
        for _ in 0..n_threads {
            let sim = Arc::clone(&sim);
            let callback = &callback;
            let mut rng = Xoroshiro128Plus::from_rng(thread_rng()).unwrap();
            scope.spawn(move || {
                if enumerate_all {
                    sim.enumerate(callback);
                } else if options.random_walk {
                    sim.sim_random_walk_monte_carlo(&mut rng, callback);
                } else {
                    sim.sim_regular_monte_carlo(&mut rng, callback);
                }
            });
        }
    });

    let sim = Arc::try_unwrap(sim).unwrap();
    let shared = sim.shared.into_inner().unwrap();
    Ok(shared.results)
}

/// Everything the workers mutate, behind one mutex.
#[derive(Debug)]
struct SharedData {
    results: SimulationResults,
    /// Sample variance accumulators for the first player's batch equities.
    batch_sum: f64,
    batch_sum_sqr: f64,
    batch_count: f64,
    /// Next unreserved preflop index (enumeration).
    enum_pos: u64,
    /// Canonical preflop id -> enumerated winner histogram.
    lookup: FxHashMap<u64, BatchResults>,
    last_update: Instant,
    unfinished_threads: u32,
}

/// Equity calculator main structure.
#[derive(Debug)]
struct Simulator {
    combined_ranges: Vec<CombinedRange>,
    board_mask: u64,
    dead_mask: u64,
    fixed_board: Hand,
    n_players: usize,
    stdev_target: f64,
    update_interval: f64,
    time_limit: f64,
    hand_limit: u64,
    stopped: Arc<AtomicBool>,
    shared: Mutex<SharedData>,
}

impl Simulator {
    #[allow(clippy::too_many_arguments)]
    fn new(
        combined_ranges: Vec<CombinedRange>,
        n_players: usize,
        board_mask: u64,
        dead_mask: u64,
        enumerate_all: bool,
        options: &SimulationOptions,
        n_threads: u32,
        cancel_token: Arc<AtomicBool>,
    ) -> Simulator {
        let mut results = SimulationResults::new(n_players, enumerate_all);
        results.preflop_combos = combined_ranges
            .iter()
            .fold(1u64, |c, r| c * r.size() as u64);
        Simulator {
            combined_ranges,
            board_mask,
            dead_mask,
            fixed_board: Hand::from_bit_mask(board_mask),
            n_players,
            stdev_target: options.stdev_target,
            update_interval: options.update_interval,
            time_limit: if options.time_limit <= 0.0 {
                f64::INFINITY
            } else {
                options.time_limit
            },
            hand_limit: if options.hand_limit == 0 {
                u64::MAX
            } else {
                options.hand_limit
            },
            stopped: cancel_token,
            shared: Mutex::new(SharedData {
                results,
                batch_sum: 0.0,
                batch_sum_sqr: 0.0,
                batch_count: 0.0,
                enum_pos: 0,
                lookup: FxHashMap::default(),
                last_update: Instant::now(),
                unfinished_threads: n_threads,
            }),
        }
    }

    /// Exhaustive enumeration worker.
    fn enumerate<F: Fn(&SimulationResults) + Sync>(&self, callback: &F) {
        let mut enum_pos = 0u64;
        let mut enum_end = 0u64;
        let mut stats = BatchResults::new(self.n_players);
        let fast_dividers: Vec<DividerU64> = self
            .combined_ranges
            .iter()
            .map(|c| DividerU64::divide_by(c.size() as u64))
            .collect();
        let preflop_combos = self.preflop_combo_count();
        let postflop_combos = self.postflop_combo_count();

        // Caching canonical preflops doesn't pay off when the postflop tree
        // is tiny.
        let use_lookup = postflop_combos > 500;
        // Visiting preflops in shuffled order spreads cache-friendly work
        // across threads, but is pointless when the postflop tree is small or
        // the preflop space can't fit in the cache anyway.
        let randomize_order =
            postflop_combos > 10_000 && preflop_combos <= 2 * MAX_LOOKUP_SIZE as u64;
        let urng = UniqueRng64::new(preflop_combos);

        loop {
            if enum_pos >= enum_end {
                let batch_size = std::cmp::max(2_000_000 / postflop_combos, 1);
                let (start, end) = self.reserve_batch(batch_size);
                enum_pos = start;
                enum_end = end;
                if enum_pos >= enum_end {
                    break;
                }
            }

            let mut rand_enum_pos = if randomize_order {
                urng.shuffle(enum_pos)
            } else {
                enum_pos
            };

            // Decode the preflop index into one combo per combined range.
            let mut ok = true;
            let mut used_cards_mask = self.board_mask | self.dead_mask;
            let mut player_hands = [HandWithIndex::default(); MAX_PLAYERS];
            for i in 0..self.combined_ranges.len() {
                let quotient = fast_dividers[i].divide(rand_enum_pos);
                let remainder =
                    rand_enum_pos - quotient * self.combined_ranges[i].size() as u64;
                rand_enum_pos = quotient;

                let combo = &self.combined_ranges[i].combos()[remainder as usize];
                if used_cards_mask & combo.mask != 0 {
                    ok = false;
                    break;
                }
                used_cards_mask |= combo.mask;
                for j in 0..self.combined_ranges[i].player_count() {
                    let player_idx = self.combined_ranges[i].players()[j];
                    player_hands[player_idx].cards = combo.hole_cards[j];
                    player_hands[player_idx].player_idx = player_idx;
                }
            }

            if !ok {
                stats.skipped_preflop_combos += 1;
            } else if use_lookup {
                // Canonical form: sorting the hands folds player order
                // isomorphism, renaming suits folds suit isomorphism.
                player_hands[..self.n_players].sort_unstable();
                for i in 0..self.n_players {
                    stats.player_ids[i] = player_hands[i].player_idx;
                }
                let (board_cards, dead_cards) = transform_suits(
                    &mut player_hands[..self.n_players],
                    self.board_mask,
                    self.dead_mask,
                );
                let mut canonical_mask = board_cards | dead_cards;
                for hand in &player_hands[..self.n_players] {
                    canonical_mask |= (1u64 << hand.cards.0) | (1u64 << hand.cards.1);
                }

                let preflop_id = unique_preflop_id(&player_hands[..self.n_players]);
                if self.lookup_results(preflop_id, &mut stats) {
                    // Histogram comes from the cache in canonical player
                    // order; remap to this deal's original players and don't
                    // count the cached evaluations again.
                    for i in 0..self.n_players {
                        stats.player_ids[i] = player_hands[i].player_idx;
                    }
                    stats.eval_count = 0;
                    stats.unique_preflop_combos = 0;
                } else {
                    stats.unique_preflop_combos += 1;
                    let board = Hand::from_bit_mask(board_cards);
                    self.enumerate_board(&player_hands, &board, canonical_mask, &mut stats);
                    self.store_results(preflop_id, &stats);
                }
            } else {
                stats.unique_preflop_combos += 1;
                self.enumerate_board(&player_hands, &self.fixed_board, used_cards_mask, &mut stats);
            }

            if stats.eval_count >= 10_000 || stats.skipped_preflop_combos >= 10_000 || use_lookup
            {
                self.update_results(&stats, false, callback);
                stats = BatchResults::new(self.n_players);
                if self.stopped.load(Ordering::SeqCst) {
                    break;
                }
            }
            enum_pos += 1;
        }

        self.update_results(&stats, true, callback);
    }

    /// Enumerate every remaining board for one preflop.
    fn enumerate_board(
        &self,
        player_hands: &[HandWithIndex],
        board: &Hand,
        used_cards_mask: u64,
        stats: &mut BatchResults,
    ) {
        let mut hands = [Hand::default(); MAX_PLAYERS];
        for i in 0..self.n_players {
            hands[i] = Hand::from_hole_cards(player_hands[i].cards.0, player_hands[i].cards.1);
        }

        let cards_remaining = (BOARD_CARDS - board.count()) as u8;
        if cards_remaining == 0 {
            self.evaluate_hands(&hands, 1, board, stats, true);
            return;
        }

        // Descending card order enumerates high ranks first; they prune
        // better.
        let mut deck = [0u8; CARD_COUNT as usize];
        let mut n_deck = 0;
        for c in (0..CARD_COUNT).rev() {
            if used_cards_mask & (1u64 << c) == 0 {
                deck[n_deck] = c;
                n_deck += 1;
            }
        }

        // Highest number of cards any single player can hold in each suit,
        // including the fixed board. A suit that cannot reach 5 can be
        // collapsed during enumeration.
        let mut suit_counts = [0u8; SUIT_COUNT as usize];
        for i in 0..self.n_players {
            let (c1, c2) = player_hands[i].cards;
            if c1 & 3 == c2 & 3 {
                suit_counts[usize::from(c1 & 3)] =
                    std::cmp::max(2, suit_counts[usize::from(c1 & 3)]);
            } else {
                suit_counts[usize::from(c1 & 3)] =
                    std::cmp::max(1, suit_counts[usize::from(c1 & 3)]);
                suit_counts[usize::from(c2 & 3)] =
                    std::cmp::max(1, suit_counts[usize::from(c2 & 3)]);
            }
        }
        for s in 0..SUIT_COUNT {
            suit_counts[usize::from(s)] += board.suit_count(s) as u8;
        }

        self.enumerate_board_rec(
            &hands,
            stats,
            board,
            &mut deck,
            n_deck,
            &mut suit_counts,
            cards_remaining,
            0,
            1,
        );
    }

    /// Recursive board enumeration with isomorphic subtree collapsing.
    ///
    /// Suits that can no longer reach 5 cards ("irrelevant" suits) make cards
    /// of equal rank interchangeable; the recursion picks one representative
    /// and weights the subtree by the number of choices it stands for.
    #[allow(clippy::too_many_arguments)]
    fn enumerate_board_rec(
        &self,
        hands: &[Hand],
        stats: &mut BatchResults,
        board: &Hand,
        deck: &mut [u8],
        n_deck: usize,
        suit_counts: &mut [u8],
        cards_remaining: u8,
        start: usize,
        weight: u64,
    ) {
        if cards_remaining == 1 {
            if suit_counts[0] < 4
                && suit_counts[1] < 4
                && suit_counts[2] < 4
                && suit_counts[3] < 4
            {
                // No flush possible: only ranks matter for the river card.
                let mut i = start;
                while i < n_deck {
                    let mut multiplier = 1;
                    let new_board = *board + CARDS[usize::from(deck[i])];
                    let rank = deck[i] >> 2;
                    i += 1;
                    while i < n_deck && deck[i] >> 2 == rank {
                        multiplier += 1;
                        i += 1;
                    }
                    self.evaluate_hands(hands, weight * multiplier, &new_board, stats, false);
                }
            } else {
                let mut last_rank = u8::MAX;
                for i in start..n_deck {
                    let mut multiplier = 1;
                    if suit_counts[usize::from(deck[i] & 3)] < 4 {
                        let rank = deck[i] >> 2;
                        if rank == last_rank {
                            continue;
                        }
                        for j in i + 1..n_deck {
                            if deck[j] >> 2 != rank {
                                break;
                            }
                            if suit_counts[usize::from(deck[j] & 3)] < 4 {
                                multiplier += 1;
                            }
                        }
                        last_rank = rank;
                    }
                    let new_board = *board + CARDS[usize::from(deck[i])];
                    self.evaluate_hands(hands, weight * multiplier, &new_board, stats, true);
                }
            }
            return;
        }

        let mut i = start;
        while i < n_deck {
            let mut new_board = *board;
            let suit = deck[i] & 3;
            if suit_counts[usize::from(suit)] + cards_remaining < 5 {
                let mut irrelevant_count = 1;
                let rank = deck[i] >> 2;
                // Group the cards of this rank whose suits are irrelevant;
                // they are interchangeable from here on.
                for j in i + 1..n_deck {
                    if deck[j] >> 2 != rank {
                        break;
                    }
                    let suit2 = deck[j] & 3;
                    if suit_counts[usize::from(suit2)] + cards_remaining < 5 {
                        if j != i + irrelevant_count {
                            deck.swap(j, i + irrelevant_count);
                        }
                        irrelevant_count += 1;
                    }
                }

                for repeats in 1..std::cmp::min(irrelevant_count, usize::from(cards_remaining)) + 1
                {
                    const BINOM_COEFF: [[u64; 5]; 5] = [
                        [0, 0, 0, 0, 0],
                        [0, 1, 0, 0, 0],
                        [1, 2, 1, 0, 0],
                        [1, 3, 3, 1, 0],
                        [1, 4, 6, 4, 1],
                    ];
                    let new_weight = BINOM_COEFF[irrelevant_count][repeats] * weight;
                    new_board += CARDS[usize::from(deck[i + repeats - 1])];
                    if repeats == usize::from(cards_remaining) {
                        self.evaluate_hands(hands, new_weight, &new_board, stats, true);
                    } else {
                        self.enumerate_board_rec(
                            hands,
                            stats,
                            &new_board,
                            deck,
                            n_deck,
                            suit_counts,
                            cards_remaining - repeats as u8,
                            i + irrelevant_count,
                            new_weight,
                        );
                    }
                }

                i += irrelevant_count - 1;
            } else {
                new_board += CARDS[usize::from(deck[i])];
                suit_counts[usize::from(suit)] += 1;
                self.enumerate_board_rec(
                    hands,
                    stats,
                    &new_board,
                    deck,
                    n_deck,
                    suit_counts,
                    cards_remaining - 1,
                    i + 1,
                    weight,
                );
                suit_counts[usize::from(suit)] -= 1;
            }
            i += 1;
        }
    }

    /// Monte carlo worker that samples every trial independently.
    fn sim_regular_monte_carlo<F: Fn(&SimulationResults) + Sync>(
        &self,
        rng: &mut Xoroshiro128Plus,
        callback: &F,
    ) {
        let mut stats = BatchResults::new(self.n_players);
        let cards_remaining = BOARD_CARDS - self.fixed_board.count();
        let mut card_dist = FastUniformInt::<16>::new(u64::from(CARD_COUNT));
        let mut combo_dists: Vec<FastUniformInt<21>> = self
            .combined_ranges
            .iter()
            .map(|c| FastUniformInt::<21>::new(c.size() as u64))
            .collect();

        loop {
            // Randomize hands and reject duplicate holecards.
            let mut used_cards_mask = self.board_mask | self.dead_mask;
            let mut player_hands = [Hand::default(); MAX_PLAYERS];
            let mut ok = true;
            for i in 0..self.combined_ranges.len() {
                let combo_idx = combo_dists[i].sample(rng);
                let combo = &self.combined_ranges[i].combos()[combo_idx];
                if used_cards_mask & combo.mask != 0 {
                    ok = false;
                    break;
                }
                for j in 0..self.combined_ranges[i].player_count() {
                    player_hands[self.combined_ranges[i].players()[j]] = combo.hands[j];
                }
                used_cards_mask |= combo.mask;
            }

            if !ok {
                stats.skipped_preflop_combos += 1;
                if stats.skipped_preflop_combos > MAX_HOLECARD_REJECTS && stats.eval_count == 0 {
                    break;
                }
                continue;
            }

            let mut board = self.fixed_board;
            randomize_board(rng, &mut board, used_cards_mask, cards_remaining, &mut card_dist);
            self.evaluate_hands(&player_hands, 1, &board, &mut stats, true);

            if stats.eval_count & 0xfff == 0 {
                self.update_results(&stats, false, callback);
                stats = BatchResults::new(self.n_players);
                if self.stopped.load(Ordering::SeqCst) {
                    break;
                }
            }
        }

        self.update_results(&stats, true, callback);
    }

    /// Monte carlo worker that random walks through the preflop space.
    ///
    /// Each step evaluates one random board for the current holecards, then
    /// advances one random combined range to its next conflict free combo.
    /// The transition graph is k-regular, so the walk's stationary
    /// distribution over feasible preflops is uniform and the equities are
    /// unbiased.
    fn sim_random_walk_monte_carlo<F: Fn(&SimulationResults) + Sync>(
        &self,
        rng: &mut Xoroshiro128Plus,
        callback: &F,
    ) {
        let mut stats = BatchResults::new(self.n_players);
        let cards_remaining = BOARD_CARDS - self.fixed_board.count();
        let mut card_dist = FastUniformInt::<16>::new(u64::from(CARD_COUNT));
        let mut combo_dists: Vec<FastUniformInt<21>> = self
            .combined_ranges
            .iter()
            .map(|c| FastUniformInt::<21>::new(c.size() as u64))
            .collect();
        let mut combined_range_dist =
            FastUniformInt::<16>::new(self.combined_ranges.len() as u64);

        let mut used_cards_mask = 0u64;
        let mut player_hands = [Hand::default(); MAX_PLAYERS];
        let mut combo_indexes = [0usize; MAX_PLAYERS];

        if self.randomize_hole_cards(
            &mut used_cards_mask,
            &mut combo_indexes,
            &mut player_hands,
            rng,
            &mut combo_dists,
        ) {
            loop {
                let mut board = self.fixed_board;
                randomize_board(rng, &mut board, used_cards_mask, cards_remaining, &mut card_dist);
                self.evaluate_hands(&player_hands, 1, &board, &mut stats, true);

                if stats.eval_count & 0xfff == 0 {
                    self.update_results(&stats, false, callback);
                    stats = BatchResults::new(self.n_players);
                    if self.stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    // Insurance against degenerate orbits: single steps might
                    // not reach every preflop when ranges overlap heavily, so
                    // re-randomize everything once in a while.
                    if !self.randomize_hole_cards(
                        &mut used_cards_mask,
                        &mut combo_indexes,
                        &mut player_hands,
                        rng,
                        &mut combo_dists,
                    ) {
                        break;
                    }
                }

                // Advance one random combined range to its next combo that
                // doesn't collide with the other ranges' current picks.
                let combined_range_idx = combined_range_dist.sample(rng);
                let combined_range = &self.combined_ranges[combined_range_idx];
                let mut combo_idx = combo_indexes[combined_range_idx];
                used_cards_mask -= combined_range.combos()[combo_idx].mask;
                let mut mask;
                loop {
                    if combo_idx == 0 {
                        combo_idx = combined_range.size();
                    }
                    combo_idx -= 1;
                    mask = combined_range.combos()[combo_idx].mask;
                    if mask & used_cards_mask == 0 {
                        break;
                    }
                }
                used_cards_mask |= mask;
                for i in 0..combined_range.player_count() {
                    player_hands[combined_range.players()[i]] =
                        combined_range.combos()[combo_idx].hands[i];
                }
                combo_indexes[combined_range_idx] = combo_idx;
            }
        }

        self.update_results(&stats, true, callback);
    }

    /// Draw one combo per combined range by rejection sampling. Returns false
    /// after too many failed attempts.
    fn randomize_hole_cards(
        &self,
        used_cards_mask: &mut u64,
        combo_indexes: &mut [usize],
        player_hands: &mut [Hand],
        rng: &mut Xoroshiro128Plus,
        combo_dists: &mut [FastUniformInt<21>],
    ) -> bool {
        for _ in 0..MAX_HOLECARD_REJECTS {
            let mut ok = true;
            *used_cards_mask = self.board_mask | self.dead_mask;
            for i in 0..self.combined_ranges.len() {
                let combo_idx = combo_dists[i].sample(rng);
                combo_indexes[i] = combo_idx;
                let combo = &self.combined_ranges[i].combos()[combo_idx];
                if *used_cards_mask & combo.mask != 0 {
                    ok = false;
                    break;
                }
                for j in 0..self.combined_ranges[i].player_count() {
                    player_hands[self.combined_ranges[i].players()[j]] = combo.hands[j];
                }
                *used_cards_mask |= combo.mask;
            }
            if ok {
                return true;
            }
        }
        false
    }

    /// Evaluate one showdown and record the winner mask.
    #[inline(always)]
    fn evaluate_hands(
        &self,
        player_hands: &[Hand],
        weight: u64,
        board: &Hand,
        stats: &mut BatchResults,
        flush_possible: bool,
    ) {
        let mut winner_mask: u8 = 0;
        let mut best_score: u16 = 0;
        let mut player_mask: u8 = 1;
        for i in 0..self.n_players {
            let hand: Hand = *board + player_hands[i];
            let score = if flush_possible {
                hand.evaluate()
            } else {
                hand.evaluate_without_flush()
            };
            match score.cmp(&best_score) {
                CmpOrdering::Greater => {
                    best_score = score;
                    winner_mask = player_mask;
                }
                CmpOrdering::Equal => {
                    winner_mask |= player_mask;
                }
                CmpOrdering::Less => {}
            }
            player_mask <<= 1;
        }
        stats.wins_by_mask[usize::from(winner_mask)] += weight;
        stats.eval_count += 1;
    }

    fn reserve_batch(&self, batch_size: u64) -> (u64, u64) {
        let total = self.preflop_combo_count();
        let mut shared = self.shared.lock().unwrap();
        let start = shared.enum_pos;
        let end = std::cmp::min(total, start + batch_size);
        shared.enum_pos = end;
        (start, end)
    }

    fn preflop_combo_count(&self) -> u64 {
        self.combined_ranges
            .iter()
            .fold(1u64, |combos, r| combos * r.size() as u64)
    }

    fn postflop_combo_count(&self) -> u64 {
        let mut cards_in_deck = u64::from(CARD_COUNT);
        cards_in_deck -= u64::from(self.fixed_board.count());
        cards_in_deck -= self.dead_mask.count_ones() as u64;
        cards_in_deck -= 2 * self.n_players as u64;
        let board_cards_remaining = u64::from(BOARD_CARDS - self.fixed_board.count());
        let mut postflop_combos = 1u64;
        for i in 0..board_cards_remaining {
            postflop_combos *= cards_in_deck - i;
        }
        for i in 0..board_cards_remaining {
            postflop_combos /= i + 1;
        }
        postflop_combos
    }

    /// Cached winner histogram for a canonical preflop, if known.
    fn lookup_results(&self, preflop_id: u64, batch: &mut BatchResults) -> bool {
        if self.board_mask == 0
            && self.dead_mask == 0
            && self.n_players == 2
            && lookup_precalculated_results(preflop_id, batch)
        {
            return true;
        }
        let shared = self.shared.lock().unwrap();
        match shared.lookup.get(&preflop_id) {
            Some(cached) => {
                *batch = *cached;
                true
            }
            None => false,
        }
    }

    fn store_results(&self, preflop_id: u64, batch: &BatchResults) {
        let mut shared = self.shared.lock().unwrap();
        shared.lookup.insert(preflop_id, *batch);
        // Keep memory bounded. With this many distinct preflops the cache
        // hit rate is negligible anyway.
        if shared.lookup.len() >= MAX_LOOKUP_SIZE {
            shared.lookup.clear();
        }
    }

    /// Merge a worker's batch into the shared results, check the stop
    /// conditions and fire the callback when due.
    fn update_results<F: Fn(&SimulationResults) + Sync>(
        &self,
        batch: &BatchResults,
        thread_finished: bool,
        callback: &F,
    ) {
        let now = Instant::now();
        let mut shared = self.shared.lock().unwrap();
        let shared = &mut *shared;

        // Scatter the winner histogram back to the original player indexes.
        let mut batch_hands = 0u64;
        let mut batch_equity = 0f64;
        {
            let results = &mut shared.results;
            for i in 0..(1usize << self.n_players) {
                let count = batch.wins_by_mask[i];
                results.interval_hands += count;
                batch_hands += count;
                let winner_count = (i as u32).count_ones();
                let mut actual_player_mask = 0usize;
                for j in 0..self.n_players {
                    if i & (1 << j) != 0 {
                        if winner_count == 1 {
                            results.wins[batch.player_ids[j]] += count;
                            if batch.player_ids[j] == 0 {
                                batch_equity += count as f64;
                            }
                        } else {
                            results.ties[batch.player_ids[j]] +=
                                count as f64 / f64::from(winner_count);
                            if batch.player_ids[j] == 0 {
                                batch_equity += count as f64 / f64::from(winner_count);
                            }
                        }
                        actual_player_mask |= 1 << batch.player_ids[j];
                    }
                }
                results.wins_by_mask[actual_player_mask] += count;
            }
            results.evaluations += batch.eval_count;
            results.skipped_preflop_combos += batch.skipped_preflop_combos;
            results.evaluated_preflop_combos += batch.unique_preflop_combos;
        }
        let batch_equity = batch_equity / (batch_hands as f64 + 1e-9);

        if !thread_finished {
            shared.batch_sum += batch_equity;
            shared.batch_sum_sqr += batch_equity * batch_equity;
            shared.batch_count += 1.0;
        } else {
            shared.unfinished_threads -= 1;
        }
        let finished = thread_finished && shared.unfinished_threads == 0;
        shared.results.finished = finished;

        let dt = now.duration_since(shared.last_update).as_secs_f64();
        if shared.results.time + dt >= self.time_limit
            || shared.results.hands + shared.results.interval_hands >= self.hand_limit
        {
            self.stopped.store(true, Ordering::SeqCst);
        }

        if dt >= self.update_interval || finished {
            let results = &mut shared.results;
            results.interval_time = dt;
            results.time += dt;
            results.hands += results.interval_hands;
            results.interval_speed = results.interval_hands as f64 / (results.interval_time + 1e-9);
            results.speed = results.hands as f64 / (results.time + 1e-9);
            results.interval_hands = 0;
            if shared.batch_count > 0.0 {
                results.stdev = (1e-9 + shared.batch_sum_sqr
                    - shared.batch_sum * shared.batch_sum / shared.batch_count)
                    .sqrt()
                    / shared.batch_count;
                results.stdev_per_hand = results.stdev * (results.hands as f64).sqrt();
            }
            if results.enumerate_all {
                results.progress = shared.enum_pos as f64 / results.preflop_combos as f64;
            } else {
                let estimated_hands =
                    (results.stdev / self.stdev_target).powi(2) * results.hands as f64;
                results.progress = (results.hands as f64 / (estimated_hands + 1e-9)).min(1.0);
            }
            if !results.enumerate_all && results.stdev < self.stdev_target {
                self.stopped.store(true, Ordering::SeqCst);
            }
            for i in 0..self.n_players {
                results.equities[i] =
                    (results.wins[i] as f64 + results.ties[i]) / (results.hands as f64 + 1e-9);
            }
            callback(&shared.results);
            shared.last_update = now;
        }
    }
}

/// Fill the remaining board cards by rejection over the card distribution.
fn randomize_board(
    rng: &mut Xoroshiro128Plus,
    board: &mut Hand,
    mut used_cards_mask: u64,
    cards_remaining: u32,
    card_dist: &mut FastUniformInt<16>,
) {
    for _ in 0..cards_remaining {
        let mut card;
        let mut card_mask;
        loop {
            card = card_dist.sample(rng);
            card_mask = 1u64 << card;
            if used_cards_mask & card_mask == 0 {
                break;
            }
        }
        used_cards_mask |= card_mask;
        *board += CARDS[card];
    }
}

/// Rename suits so that the first suit encountered becomes 0, the second 1,
/// and so on. Board cards are visited first, then dead cards, then hole
/// cards in sorted player order; the cache key is derived from the hole
/// cards alone, so the fixed cards must claim their suit names first for
/// equal keys to imply equal boards.
fn transform_suits(
    player_hands: &mut [HandWithIndex],
    board_mask: u64,
    dead_mask: u64,
) -> (u64, u64) {
    let mut transform = [u8::MAX; SUIT_COUNT as usize];
    let mut suit_count = 0u8;

    let mut new_board = 0u64;
    for c in 0..CARD_COUNT {
        if board_mask >> c & 1 != 0 {
            let suit = c & SUIT_MASK;
            if transform[usize::from(suit)] == u8::MAX {
                transform[usize::from(suit)] = suit_count;
                suit_count += 1;
            }
            new_board |= 1u64 << ((c & RANK_MASK) | transform[usize::from(suit)]);
        }
    }

    let mut new_dead = 0u64;
    for c in 0..CARD_COUNT {
        if dead_mask >> c & 1 != 0 {
            let suit = c & SUIT_MASK;
            if transform[usize::from(suit)] == u8::MAX {
                transform[usize::from(suit)] = suit_count;
                suit_count += 1;
            }
            new_dead |= 1u64 << ((c & RANK_MASK) | transform[usize::from(suit)]);
        }
    }

    for hand in player_hands.iter_mut() {
        for card in [&mut hand.cards.0, &mut hand.cards.1] {
            let suit = *card & SUIT_MASK;
            if transform[usize::from(suit)] == u8::MAX {
                transform[usize::from(suit)] = suit_count;
                suit_count += 1;
            }
            *card = (*card & RANK_MASK) | transform[usize::from(suit)];
        }
    }

    (new_board, new_dead)
}

/// Unique 64-bit id of a sorted canonical preflop: the hole card pairs as
/// digits of a base 1327 number, each pair (a, b) with a > b mapped to
/// a(a-1)/2 + b + 1.
fn unique_preflop_id(player_hands: &[HandWithIndex]) -> u64 {
    let mut id = 0u64;
    for hand in player_hands {
        id *= 1327;
        let (mut a, mut b) = (u64::from(hand.cards.0), u64::from(hand.cards.1));
        if a < b {
            std::mem::swap(&mut a, &mut b);
        }
        id += a * (a - 1) / 2 + b + 1;
    }
    id
}

/// Exact heads-up preflop results packed into sorted 64-bit records: bits
/// 0-21 the preflop id, bits 22-42 first player wins, bits 43-63 second
/// player wins; ties are the remainder of the 1,712,304 runouts. Shipped
/// empty; the lookup path stays in place for builds that bundle a table.
static PRECALCULATED_2PLAYER_RESULTS: &[u64] = &[];

/// Number of 5-card boards once 2 players hold 2 cards each: C(48, 5).
const PRECALC_BOARD_COUNT: u64 = 1_712_304;

fn lookup_precalculated_results(preflop_id: u64, batch: &mut BatchResults) -> bool {
    let id = preflop_id & 0x3f_ffff;
    match PRECALCULATED_2PLAYER_RESULTS.binary_search_by_key(&id, |&record| record & 0x3f_ffff) {
        Ok(pos) => {
            let record = PRECALCULATED_2PLAYER_RESULTS[pos];
            batch.wins_by_mask[1] = (record >> 22) & 0x1f_ffff;
            batch.wins_by_mask[3] = (record >> 43) & 0x1f_ffff;
            batch.wins_by_mask[2] =
                PRECALC_BOARD_COUNT - batch.wins_by_mask[1] - batch.wins_by_mask[3];
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand_range::{get_card_mask, HandRange};

    const THREADS: u8 = 4;

    fn options() -> SimulationOptions {
        SimulationOptions {
            n_threads: THREADS,
            ..SimulationOptions::default()
        }
    }

    fn ranges(descriptions: &[&str]) -> Vec<HandRange> {
        HandRange::from_strings(descriptions.iter().map(|s| s.to_string()).collect())
    }

    fn exact(descriptions: &[&str], board: &str, dead: &str) -> SimulationResults {
        exact_equity(
            &ranges(descriptions),
            get_card_mask(board),
            get_card_mask(dead),
            options(),
            Arc::new(AtomicBool::new(false)),
            |_: &SimulationResults| {},
        )
        .unwrap()
    }

    fn assert_monte_carlo_converges(
        descriptions: &[&str],
        board: &str,
        dead: &str,
        expected_wins_by_mask: &[u64],
        random_walk: bool,
    ) {
        let results = approx_equity(
            &ranges(descriptions),
            get_card_mask(board),
            get_card_mask(dead),
            SimulationOptions {
                n_threads: THREADS,
                stdev_target: 5e-5,
                time_limit: 10.0,
                random_walk,
                ..SimulationOptions::default()
            },
            Arc::new(AtomicBool::new(false)),
            |_: &SimulationResults| {},
        )
        .unwrap();
        assert!(results.finished);
        let total: f64 = results.wins_by_mask.iter().sum::<u64>() as f64;
        let expected_total: f64 = expected_wins_by_mask.iter().sum::<u64>() as f64;
        assert!(total > 0.0);
        for (got, expected) in results.wins_by_mask.iter().zip(expected_wins_by_mask) {
            let err = (*got as f64 / total - *expected as f64 / expected_total).abs();
            assert!(err < 2e-4, "bucket error {} too big", err);
        }
    }

    #[test]
    fn test_enumerate_aa_vs_kk() {
        let results = exact(&["AA", "KK"], "", "");
        assert_eq!(results.wins_by_mask, vec![0, 50371344, 10986372, 285228]);
        assert!(results.finished);
        assert_eq!(results.hands, 50371344 + 10986372 + 285228);
        assert_eq!(results.preflop_combos, 36);
        assert_eq!(results.skipped_preflop_combos, 0);
    }

    #[test]
    fn test_enumerate_ak_vs_random_with_board() {
        let results = exact(&["AK", "random"], "2c3c", "");
        assert_eq!(results.wins_by_mask, vec![0, 159167583, 108567320, 6233737]);
    }

    #[test]
    fn test_enumerate_three_players_with_dead_card() {
        let results = exact(&["random", "AA", "33"], "2c3c8h", "6h");
        assert_eq!(
            results.wins_by_mask,
            vec![0, 808395, 1681125, 20076, 12151512, 0, 0, 0]
        );
    }

    #[test]
    fn test_enumerate_full_board() {
        let results = exact(&["random", "random", "AK"], "4hAd3c4c7c", "6h");
        assert_eq!(
            results.wins_by_mask,
            vec![0, 1461364, 1461364, 6386, 6760010, 42420, 42420, 108]
        );
    }

    #[test]
    fn test_enumerate_exact_combos() {
        let results = exact(&["3d7d", "2h9h", "2c9c"], "5d5h5c", "3s3c");
        assert_eq!(results.wins_by_mask, vec![0, 183, 28, 0, 28, 0, 380, 201]);
    }

    #[test]
    fn test_enumerate_overlapping_ranges() {
        let results = exact(&["AA,KK", "KK,QQ", "QQ,AA"], "", "");
        assert_eq!(
            results.wins_by_mask,
            vec![
                0, 348272820, 119882736, 37653912, 303253020, 74015280, 1266624, 3904200
            ]
        );
    }

    #[test]
    fn test_enumerate_counters() {
        let results = exact(&["AA", "KK"], "", "");
        assert!(results.enumerate_all);
        assert!(results.evaluations > 0);
        assert!(results.evaluated_preflop_combos > 0);
        assert!(results.evaluated_preflop_combos <= 36);
        assert!((results.progress - 1.0).abs() < 1e-9);
        assert_eq!(results.wins_by_mask[0], 0);
    }

    #[test]
    fn test_monte_carlo_random_walk() {
        assert_monte_carlo_converges(&["AA", "KK"], "", "", &[0, 50371344, 10986372, 285228], true);
    }

    #[test]
    fn test_monte_carlo_uniform_sampling() {
        assert_monte_carlo_converges(
            &["AA", "KK"],
            "",
            "",
            &[0, 50371344, 10986372, 285228],
            false,
        );
    }

    #[test]
    fn test_monte_carlo_exact_combos() {
        assert_monte_carlo_converges(
            &["3d7d", "2h9h", "2c9c"],
            "5d5h5c",
            "3s3c",
            &[0, 183, 28, 0, 28, 0, 380, 201],
            true,
        );
    }

    #[test]
    fn test_rejects_no_players() {
        let err = exact_equity(
            &[],
            0,
            0,
            options(),
            Arc::new(AtomicBool::new(false)),
            |_: &SimulationResults| {},
        )
        .unwrap_err();
        assert_eq!(err, SimulatorError::TooFewPlayers);
    }

    #[test]
    fn test_rejects_too_many_players() {
        let descriptions = vec!["random".to_string(); 7];
        let err = exact_equity(
            &HandRange::from_strings(descriptions),
            0,
            0,
            options(),
            Arc::new(AtomicBool::new(false)),
            |_: &SimulationResults| {},
        )
        .unwrap_err();
        assert_eq!(err, SimulatorError::TooManyPlayers);
    }

    #[test]
    fn test_rejects_too_many_board_cards() {
        let err = exact_equity(
            &ranges(&["AA", "KK"]),
            get_card_mask("2s3s4s5s6s7s"),
            0,
            options(),
            Arc::new(AtomicBool::new(false)),
            |_: &SimulationResults| {},
        )
        .unwrap_err();
        assert_eq!(err, SimulatorError::TooManyBoardCards);
    }

    #[test]
    fn test_rejects_too_many_dead_cards() {
        // 6 players use 12 cards, 5 board cards stay reserved; 36 dead cards
        // leave the deck one card short
        let dead_mask = (1u64 << 36) - 1;
        let descriptions = vec!["random".to_string(); 6];
        let err = exact_equity(
            &HandRange::from_strings(descriptions),
            0,
            dead_mask,
            options(),
            Arc::new(AtomicBool::new(false)),
            |_: &SimulationResults| {},
        )
        .unwrap_err();
        assert_eq!(err, SimulatorError::TooManyDeadCards);
    }

    #[test]
    fn test_rejects_range_emptied_by_dead_cards() {
        // the only combo conflicts with a dead card
        let err = exact_equity(
            &ranges(&["AsAh", "KK"]),
            0,
            get_card_mask("As"),
            options(),
            Arc::new(AtomicBool::new(false)),
            |_: &SimulationResults| {},
        )
        .unwrap_err();
        assert_eq!(err, SimulatorError::ConflictingRanges);
    }

    #[test]
    fn test_rejects_infeasible_holecards() {
        // both players can only hold the same two cards
        let err = exact_equity(
            &ranges(&["AsAh", "AsAh"]),
            0,
            0,
            options(),
            Arc::new(AtomicBool::new(false)),
            |_: &SimulationResults| {},
        )
        .unwrap_err();
        assert_eq!(err, SimulatorError::ConflictingRanges);
    }

    #[test]
    fn test_time_limit() {
        let results = approx_equity(
            &ranges(&["random", "random"]),
            0,
            0,
            SimulationOptions {
                n_threads: THREADS,
                stdev_target: 0.0,
                time_limit: 1.0,
                ..SimulationOptions::default()
            },
            Arc::new(AtomicBool::new(false)),
            |_: &SimulationResults| {},
        )
        .unwrap();
        assert!(results.finished);
        assert!(results.time >= 0.9, "stopped too early: {}", results.time);
        assert!(results.time <= 1.2, "stopped too late: {}", results.time);
    }

    #[test]
    fn test_hand_limit() {
        const HAND_LIMIT: u64 = 200_000;
        let results = approx_equity(
            &ranges(&["random", "random"]),
            0,
            0,
            SimulationOptions {
                n_threads: THREADS,
                stdev_target: 0.0,
                hand_limit: HAND_LIMIT,
                ..SimulationOptions::default()
            },
            Arc::new(AtomicBool::new(false)),
            |_: &SimulationResults| {},
        )
        .unwrap();
        assert!(results.finished);
        assert!(results.hands >= HAND_LIMIT);
        assert!(results.hands <= HAND_LIMIT + 16 * 4096);
    }

    #[test]
    fn test_player_order_invariance() {
        let a = exact(&["random", "AA", "33"], "2c3c8h", "6h");
        let b = exact(&["33", "random", "AA"], "2c3c8h", "6h");
        // player i of run A is player (i + 1) % 3 of run B
        for i in 0..3 {
            assert_eq!(a.wins[i], b.wins[(i + 1) % 3]);
            assert!((a.ties[i] - b.ties[(i + 1) % 3]).abs() < 1e-9);
            assert!((a.equities[i] - b.equities[(i + 1) % 3]).abs() < 1e-9);
        }
        assert_eq!(a.hands, b.hands);
    }

    #[test]
    fn test_single_player() {
        let results = exact(&["AA"], "", "");
        assert!((results.equities[0] - 1.0).abs() < 1e-9);
        assert_eq!(results.wins_by_mask[0], 0);
        assert_eq!(results.wins_by_mask[1], results.hands);
    }

    #[test]
    fn test_cancel_token_stops_simulation() {
        let cancel_token = Arc::new(AtomicBool::new(false));
        let token_for_callback = Arc::clone(&cancel_token);
        let results = approx_equity(
            &ranges(&["random", "random"]),
            0,
            0,
            SimulationOptions {
                n_threads: THREADS,
                stdev_target: 0.0,
                ..SimulationOptions::default()
            },
            cancel_token,
            move |update: &SimulationResults| {
                if update.hands > 0 {
                    token_for_callback.store(true, Ordering::SeqCst);
                }
            },
        )
        .unwrap();
        assert!(results.finished);
    }

    #[test]
    fn test_unique_preflop_id_mapping() {
        // a lone pair (a, b) with a > b maps to a(a-1)/2 + b + 1
        let hands = [HandWithIndex {
            cards: (1, 0),
            player_idx: 0,
        }];
        assert_eq!(unique_preflop_id(&hands), 1);
        let hands = [HandWithIndex {
            cards: (51, 50),
            player_idx: 0,
        }];
        assert_eq!(unique_preflop_id(&hands), 1326);
        // two players build a base 1327 number
        let hands = [
            HandWithIndex {
                cards: (1, 0),
                player_idx: 0,
            },
            HandWithIndex {
                cards: (3, 2),
                player_idx: 1,
            },
        ];
        assert_eq!(unique_preflop_id(&hands), 1327 + 6);
    }

    #[test]
    fn test_transform_suits_orders_board_first() {
        // board claims suit names before the hole cards
        let board = get_card_mask("2c3c");
        let mut hands = [
            HandWithIndex {
                cards: (get_single_card("As"), get_single_card("Ks")),
                player_idx: 0,
            },
            HandWithIndex {
                cards: (get_single_card("Ah"), get_single_card("Kh")),
                player_idx: 1,
            },
        ];
        let (new_board, new_dead) = transform_suits(&mut hands, board, 0);
        // clubs become suit 0
        assert_eq!(new_board, get_card_mask("2s3s"));
        assert_eq!(new_dead, 0);
        // spades (first hole suit seen) become suit 1, hearts suit 2
        assert_eq!(hands[0].cards, (get_single_card("Ah"), get_single_card("Kh")));
        assert_eq!(hands[1].cards, (get_single_card("Ac"), get_single_card("Kc")));
    }

    fn get_single_card(text: &str) -> u8 {
        get_card_mask(text).trailing_zeros() as u8
    }

    #[test]
    fn test_precalculated_lookup_is_empty_safe() {
        let mut batch = BatchResults::new(2);
        assert!(!lookup_precalculated_results(1, &mut batch));
    }
}
