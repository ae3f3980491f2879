pub mod ul_sched;
