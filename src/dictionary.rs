//! Built-in word list.
//!
//! Order matters: the generator draws from this slice by index, so reordering
//! or editing entries changes every puzzle ever generated. Append only.

pub const WORDS: &[&str] = &[
    "ANT", "BEE", "CAT", "DOG", "ELK", "FOX", "GNU", "HEN", "OWL", "YAK",
    "ASH", "ELM", "FIG", "OAK", "PEA", "RYE", "SKY", "SUN", "SEA", "ICE",
    "BEAR", "CRAB", "DEER", "DOVE", "FROG", "GOAT", "HAWK", "LION", "MOLE", "SEAL",
    "WOLF", "WREN", "LEAF", "ROOT", "SEED", "TREE", "RAIN", "SNOW", "WIND", "MIST",
    "LAKE", "HILL", "CAVE", "DUNE", "REEF", "MOON", "STAR", "TIDE",
    "BISON", "CAMEL", "CRANE", "EAGLE", "GECKO", "HERON", "HORSE", "KOALA", "LLAMA",
    "MOOSE", "OTTER", "PANDA", "SHARK", "SKUNK", "TIGER", "WHALE", "ZEBRA", "BIRCH",
    "CEDAR", "MAPLE", "STORM", "CLOUD", "FROST", "RIVER", "CORAL", "OCEAN", "DELTA",
    "GROVE", "MARSH",
    "BADGER", "BEAVER", "DONKEY", "FALCON", "FERRET", "GIRAFFE", "JAGUAR", "LIZARD",
    "MAGPIE", "OYSTER", "PARROT", "PIGEON", "RABBIT", "SALMON", "TURTLE", "WALRUS",
    "WILLOW", "SPRUCE", "CACTUS", "ORCHID", "BREEZE", "CANYON", "GLACIER", "ISLAND",
    "LAGOON", "MEADOW", "TUNDRA", "FOREST", "SUMMIT",
    "BUFFALO", "CHEETAH", "DOLPHIN", "GAZELLE", "GORILLA", "HAMSTER", "LEOPARD",
    "OSTRICH", "PANTHER", "PENGUIN", "PELICAN", "SPARROW", "SQUIRREL", "TOUCAN",
    "VULTURE", "CYPRESS", "JUNIPER", "SEQUOIA", "THUNDER", "DRIZZLE", "VOLCANO",
    "PRAIRIE", "HARBOUR", "CAVERNS",
    "ANTELOPE", "ARMADILLO", "BUTTERFLY", "CARDINAL", "CHIPMUNK", "CROCODILE",
    "ELEPHANT", "FLAMINGO", "HEDGEHOG", "KANGAROO", "MONGOOSE", "MOSQUITO", "PEACOCK",
    "REINDEER", "SCORPION", "TORTOISE", "MAGNOLIA", "SUNFLOWER", "HURRICANE",
    "LIGHTNING", "RAINBOW", "WATERFALL", "MOUNTAIN", "PLATEAU", "ESTUARY",
    "ALLIGATOR", "CHAMELEON", "PORCUPINE", "SALAMANDER", "WOODPECKER", "HUMMINGBIRD",
    "RHINOCEROS", "DRAGONFLY", "JELLYFISH", "NIGHTINGALE", "HIPPOPOTAMUS",
    "EVERGREEN", "SNOWFLAKE", "THUNDERSTORM", "AVALANCHE", "ARCHIPELAGO",
    "PENINSULA", "RAINFOREST", "WILDERNESS", "CONSTELLATION",
];

/// Dictionary words that fit in a grid of the given size, at least `min_len`
/// letters long.
pub fn words_fitting(grid_size: usize, min_len: usize) -> impl Iterator<Item = &'static str> {
    WORDS
        .iter()
        .copied()
        .filter(move |w| w.len() >= min_len && w.len() <= grid_size)
}
