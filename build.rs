fn main() {
    // ESP-IDF link arguments are only needed for the on-target binary;
    // host builds (tests, fuzzing) skip the embuild sysenv probe.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
