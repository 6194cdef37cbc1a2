pub mod hard_swish;
