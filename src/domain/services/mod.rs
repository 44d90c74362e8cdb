mod partition_namer;

pub use partition_namer::PartitionNamer;
