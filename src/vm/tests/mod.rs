// Each mock test creates its own MMTk instance with the mock host. Instances are independent,
// and they are leaked when the test ends: the GC threads of an instance never exit.

mod mock_tests;
