mod dockerfile;
mod workflow;
