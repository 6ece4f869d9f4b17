use crate::util::constants::*;
use std::default::Default;
use std::str::FromStr;
use strum_macros::EnumString;

/// How long an explicit pin (see [`crate::memory_manager::pin_object`]) lasts.
#[derive(Copy, Clone, EnumString, Debug, PartialEq, Eq)]
pub enum PinLifetime {
    /// A pinned object stays pinned until it dies. `unpin_object` is refused.
    Permanent,
    /// The host tracks its pins and reverses them with `unpin_object`.
    Explicit,
}

/// The smallest heap we accept.
pub const MIN_HEAP_SIZE: usize = BYTES_IN_MBYTE;
/// The default lower bound of the heap size.
pub const DEFAULT_MIN_HEAP_SIZE: usize = 32 << LOG_BYTES_IN_MBYTE;
/// The default upper bound never exceeds this, whatever the physical memory is.
pub const DEFAULT_MAX_HEAP_SIZE_CAP: usize = 4 << LOG_BYTES_IN_GBYTE;
/// The default limit of mutators that can be bound at the same time.
pub const DEFAULT_MAX_MUTATORS: usize = 1024;

/// Half of the physical memory, capped at [`DEFAULT_MAX_HEAP_SIZE_CAP`].
fn default_max_heap_size() -> usize {
    use sysinfo::System;
    let mut sys = System::new();
    sys.refresh_memory();
    let half = (sys.total_memory() / 2) as usize;
    half.clamp(DEFAULT_MIN_HEAP_SIZE, DEFAULT_MAX_HEAP_SIZE_CAP)
}

fn always_valid<T>(_: &T) -> bool {
    true
}

macro_rules! options {
    ($($(#[$outer:meta])* $name:ident: $type:ty[$validator:expr] = $default:expr),*,) => [
        options!($($(#[$outer])* $name: $type[$validator] = $default),*);
    ];
    ($($(#[$outer:meta])* $name:ident: $type:ty[$validator:expr] = $default:expr),*) => [
        /// Runtime options. Each option has a type, a validator and a default value. The
        /// default can be overridden by `MMTK_<NAME>` environment variables, and then by
        /// [`crate::memory_manager::process`] and [`crate::memory_manager::process_bulk`].
        #[derive(Clone, Debug)]
        pub struct Options {
            $($(#[$outer])* pub $name: $type),*
        }

        impl Options {
            /// Set an option from its string form. Returns false if the key is unknown,
            /// or the value cannot be parsed or fails validation. The option is unchanged on failure.
            pub fn set_from_str(&mut self, s: &str, val: &str) -> bool {
                match s {
                    // Parse the given value from str (by env vars or by calling process()) to the right type
                    $(stringify!($name) => match val.parse::<$type>() {
                        Ok(val) => {
                            let validate_fn = $validator;
                            let is_valid = validate_fn(&val);
                            if is_valid {
                                self.$name = val;
                            } else {
                                warn!("Unable to set {}={:?}. Invalid value.", s, val);
                            }
                            is_valid
                        }
                        Err(_) => {
                            warn!("Unable to set {}={:?}. Cannot parse value.", s, val);
                            false
                        }
                    })*
                    _ => {
                        warn!("Unknown option key: {}", s);
                        false
                    }
                }
            }

            /// Is `s` the name of an option declared in this struct?
            fn is_declared(s: &str) -> bool {
                matches!(s, $(stringify!($name))|*)
            }
        }

        impl Default for Options {
            fn default() -> Self {
                let mut options = Options {
                    $($name: $default),*
                };

                // If we have env vars that start with MMTK_ and match any option (such as MMTK_THREADS),
                // we set the option to its value (if it is a valid value). Otherwise, use the default value.
                const PREFIX: &str = "MMTK_";
                for (key, val) in std::env::vars() {
                    if let Some(rest_of_key) = key.strip_prefix(PREFIX) {
                        let lowercase: &str = &rest_of_key.to_lowercase();
                        if Options::is_declared(lowercase) || lowercase == HEAP_SIZE_KEY {
                            options.set_from_command_line(lowercase, &val);
                        }
                    }
                }
                options
            }
        }
    ]
}

/// A pseudo option: it sets both `min_heap_size` and `max_heap_size`, giving a fixed-size heap.
const HEAP_SIZE_KEY: &str = "heap_size";

options! {
    /// Number of GC worker threads.
    threads:                    usize        [|v: &usize| *v > 0]              = num_cpus::get(),
    /// The lower bound of the heap size in bytes. The heap starts at this size.
    min_heap_size:              usize        [|v: &usize| *v >= MIN_HEAP_SIZE] = DEFAULT_MIN_HEAP_SIZE,
    /// The upper bound of the heap size in bytes. This much address space is reserved at start-up.
    max_heap_size:              usize        [|v: &usize| *v >= MIN_HEAP_SIZE] = default_max_heap_size(),
    /// How many mutators can be bound at the same time.
    max_mutators:               usize        [|v: &usize| *v > 0 && *v <= u32::MAX as usize] = DEFAULT_MAX_MUTATORS,
    /// Should the host scan each mutator as soon as it stops (in the `stop_all_mutators` visitor)?
    scan_mutators_in_safepoint: bool         [always_valid]                    = true,
    /// How long an explicit pin lasts.
    pin_lifetime:               PinLifetime  [always_valid]                    = PinLifetime::Permanent,
    /// Should we ignore GCs requested by the user?
    ignore_system_gc:           bool         [always_valid]                    = false,
    /// Should finalization be disabled?
    no_finalizer:               bool         [always_valid]                    = false,
    /// Verify the heap after each closure by re-scanning the roots.
    sanity:                     bool         [always_valid]                    = false,
}

impl Options {
    /// Set an option by its command line name. Besides the declared options, this accepts
    /// `heap_size`, which sets both heap bounds.
    pub fn set_from_command_line(&mut self, key: &str, value: &str) -> bool {
        trace!("Trying to process option pair: ({}, {})", key, value);
        if key == HEAP_SIZE_KEY {
            return match usize::from_str(value) {
                Ok(size) if size >= MIN_HEAP_SIZE => {
                    self.min_heap_size = size;
                    self.max_heap_size = size;
                    true
                }
                _ => {
                    warn!("Unable to set {}={:?}. Invalid value.", key, value);
                    false
                }
            };
        }
        self.set_from_str(key, value)
    }

    /// Set options in bulk from a whitespace-separated list of `key=value` pairs.
    /// Either all the options are set, or none of them is: if any pair fails, the options
    /// are left as they were and this returns false.
    pub fn set_bulk_from_command_line(&mut self, options: &str) -> bool {
        let mut staged = self.clone();
        for opt in options.split_ascii_whitespace() {
            let Some((key, value)) = opt.split_once('=') else {
                warn!("Malformed option {:?}, expected key=value", opt);
                return false;
            };
            if !staged.set_from_command_line(key, value) {
                return false;
            }
        }
        *self = staged;
        true
    }

    /// The heap bounds as `(min, max)`, block aligned. If the minimum exceeds the maximum,
    /// the heap is fixed at the maximum.
    pub fn heap_bounds(&self) -> (usize, usize) {
        let max = crate::util::conversions::raw_align_up(self.max_heap_size, BYTES_IN_BLOCK);
        let min = crate::util::conversions::raw_align_up(self.min_heap_size, BYTES_IN_BLOCK);
        if min > max {
            warn!(
                "min_heap_size ({}) is larger than max_heap_size ({}). Use a fixed heap of {} bytes.",
                min, max, max
            );
            (max, max)
        } else {
            (min, max)
        }
    }
}
