pub mod tx_serializer;
